use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bot.
///
/// Everything comes from environment variables (with an optional `.env` file);
/// the defaults match the long-running production deployment.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub admin_id: i64,
    pub debug: bool,
    pub db_path: PathBuf,

    // Price ticker (disabled unless both CHAT_ID and SYMBOLS are set)
    pub price_chat_id: Option<i64>,
    pub symbols: Vec<String>,
    pub ticker_interval: Duration,

    // Moderation tunables
    pub rate_limit_max_calls: u32,
    pub rate_limit_period: Duration,
    pub cache_ttl: Duration,
    pub cleanup_interval: Duration,
    pub notice_ttl: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admin_id = env_i64("ADMIN_ID").ok_or_else(|| {
            Error::Config("ADMIN_ID environment variable is required (numeric)".to_string())
        })?;

        let debug = env_bool("DEBUG_MODE").unwrap_or(false);

        let db_path = env_path("DB_PATH").unwrap_or_else(|| PathBuf::from("data/guard.db"));
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let price_chat_id = env_i64("CHAT_ID");
        let symbols = parse_symbols(env_str("SYMBOLS"));
        let ticker_interval = Duration::from_secs(env_u64("TICKER_INTERVAL_SECS").unwrap_or(3600));

        let rate_limit_max_calls = env_u32("RATE_LIMIT_MAX_CALLS").unwrap_or(10);
        let rate_limit_period =
            Duration::from_millis(env_u64("RATE_LIMIT_PERIOD_MS").unwrap_or(1000));
        let cache_ttl = Duration::from_secs(env_u64("CACHE_TTL_SECS").unwrap_or(300));
        let cleanup_interval =
            Duration::from_secs(env_u64("CLEANUP_INTERVAL_SECS").unwrap_or(24 * 3600));
        let notice_ttl = Duration::from_secs(env_u64("NOTICE_TTL_SECS").unwrap_or(180));

        Ok(Self {
            bot_token,
            admin_id,
            debug,
            db_path,
            price_chat_id,
            symbols,
            ticker_interval,
            rate_limit_max_calls,
            rate_limit_period,
            cache_ttl,
            cleanup_interval,
            notice_ttl,
        })
    }

    pub fn ticker_enabled(&self) -> bool {
        self.price_chat_id.is_some() && !self.symbols.is_empty()
    }
}

/// `SYMBOLS` is a comma-separated list like `BTC/USDT,ETHUSDT`; the exchange
/// API wants the slash-free upper-case form.
fn parse_symbols(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().replace('/', "").to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_uppercased_and_slash_free() {
        let got = parse_symbols(Some("btc/usdt, ETHUSDT ,,sol/usdt".to_string()));
        assert_eq!(got, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    }

    #[test]
    fn symbols_empty_when_unset() {
        assert!(parse_symbols(None).is_empty());
    }
}
