use std::sync::Arc;

use linkguard_core::{config::Config, maintenance, messaging::MessagingPort, store::KeywordStore};
use linkguard_telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> Result<(), linkguard_core::Error> {
    linkguard_core::logging::init("linkguard")?;

    let cfg = Arc::new(Config::load()?);
    let store = Arc::new(KeywordStore::open(&cfg.db_path, cfg.cache_ttl)?);

    tokio::spawn(maintenance::run_cleanup_task(
        store.clone(),
        cfg.cleanup_interval,
    ));

    if cfg.ticker_enabled() {
        let messenger: Arc<dyn MessagingPort> =
            Arc::new(TelegramMessenger::from_token(&cfg.bot_token));
        tokio::spawn(linkguard_binance::run_ticker(
            cfg.clone(),
            store.clone(),
            messenger,
        ));
    }

    linkguard_telegram::router::run_with_backoff(cfg, store).await;
    Ok(())
}
