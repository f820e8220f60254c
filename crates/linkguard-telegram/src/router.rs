use std::{sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};

use linkguard_core::{
    config::Config, filter::FilterEngine, messaging::MessagingPort, ratelimit::RateLimiter,
    store::KeywordStore,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<KeywordStore>,
    pub filter: Arc<FilterEngine>,
    pub rate_limiter: Arc<RateLimiter>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Keep restarting the polling loop on failure with exponential backoff
/// (base 1s, capped at 5 minutes). A clean exit resets the delay.
pub async fn run_with_backoff(cfg: Arc<Config>, store: Arc<KeywordStore>) {
    let base_delay = Duration::from_secs(1);
    let max_delay = Duration::from_secs(300);
    let mut delay = base_delay;

    loop {
        match run_polling(cfg.clone(), store.clone()).await {
            Ok(()) => {
                delay = base_delay;
                println!("[bot] disconnected; restarting immediately");
            }
            Err(e) => {
                eprintln!("[bot] error: {e}");
                eprintln!("[bot] restarting in {delay:?}");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<KeywordStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    // Basic startup info.
    if let Ok(me) = bot.get_me().await {
        println!("[bot] started: @{}", me.username());
    }
    println!("[bot] admin id: {}", cfg.admin_id);

    register_commands(&bot).await?;

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState {
        filter: Arc::new(FilterEngine::new(store.clone())),
        rate_limiter: Arc::new(RateLimiter::new(
            cfg.rate_limit_max_calls,
            cfg.rate_limit_period,
        )),
        cfg,
        store,
        messenger,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn register_commands(bot: &Bot) -> anyhow::Result<()> {
    let commands = vec![
        BotCommand::new("add", "Add a new keyword"),
        BotCommand::new("delete", "Delete an existing keyword"),
        BotCommand::new("list", "List all current keywords"),
        BotCommand::new("deletecontaining", "Delete keywords containing a substring"),
        BotCommand::new("addwhite", "Add a domain to the whitelist"),
        BotCommand::new("delwhite", "Remove a domain from the whitelist"),
        BotCommand::new("listwhite", "List whitelisted domains"),
        BotCommand::new("prompt", "Manage auto-reply triggers (set|delete|list)"),
    ];

    bot.set_my_commands(commands)
        .await
        .map_err(|e| anyhow::anyhow!("failed to register bot commands: {e}"))?;
    println!("[bot] commands registered");
    Ok(())
}
