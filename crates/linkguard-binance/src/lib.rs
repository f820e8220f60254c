//! Binance price ticker.
//!
//! Fetches spot prices from the public Binance REST API and posts an hourly
//! Markdown summary to the configured chat, replacing the previous summary so
//! the chat only ever carries one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use linkguard_core::{
    config::Config,
    domain::ChatId,
    errors::Error,
    messaging::{message_ref, MessagingPort},
    store::KeywordStore,
    Result,
};

/// Config-table key holding the id of the last posted summary.
const LAST_MSG_KEY: &str = "binance_last_msg_id";

const API_BASE: &str = "https://api.binance.com/api/v3";

#[derive(Clone, Debug)]
pub struct BinanceClient {
    http: reqwest::Client,
}

/// `/ticker/price` response. Binance returns numbers as strings.
#[derive(Debug, Deserialize)]
struct PriceResponse {
    symbol: String,
    price: String,
}

/// Subset of the `/ticker/24hr` response we care about.
#[derive(Debug, Deserialize)]
struct DayStats {
    #[serde(rename = "priceChangePercent")]
    price_change_percent: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TickerInfo {
    pub symbol: String,
    pub last: f64,
    pub change_percent: f64,
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client build");
        Self { http }
    }

    /// Current price plus 24h change for one symbol (two API calls).
    pub async fn fetch_ticker(&self, symbol: &str) -> Result<TickerInfo> {
        let price: PriceResponse = self
            .get_json(&format!("{API_BASE}/ticker/price?symbol={symbol}"))
            .await?;
        let stats: DayStats = self
            .get_json(&format!("{API_BASE}/ticker/24hr?symbol={symbol}"))
            .await?;
        build_info(price, stats)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::External(format!("binance request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "binance request failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::External(format!("binance json error: {e}")))
    }
}

fn build_info(price: PriceResponse, stats: DayStats) -> Result<TickerInfo> {
    let last = price
        .price
        .parse::<f64>()
        .map_err(|e| Error::External(format!("binance price parse error: {e}")))?;
    let change_percent = stats
        .price_change_percent
        .parse::<f64>()
        .map_err(|e| Error::External(format!("binance change parse error: {e}")))?;

    Ok(TickerInfo {
        symbol: price.symbol,
        last,
        change_percent,
    })
}

pub fn format_change(change_percent: f64) -> String {
    if change_percent > 0.0 {
        format!("🔼 +{change_percent:.2}%")
    } else if change_percent < 0.0 {
        format!("🔽 {change_percent:.2}%")
    } else {
        "➖ 0.00%".to_string()
    }
}

fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{price:.2}")
    } else {
        format!("{price:.6}")
    }
}

pub fn build_price_message(infos: &[TickerInfo], now: DateTime<Utc>) -> String {
    let mut out = format!("*Market update {} UTC*\n\n", now.format("%Y-%m-%d %H:%M"));
    for info in infos {
        out.push_str(&format!(
            "*{}*: {} ({})\n",
            info.symbol,
            format_price(info.last),
            format_change(info.change_percent)
        ));
    }
    out
}

/// Hourly loop. Never returns; per-symbol failures are logged and the round
/// continues with whatever fetched.
pub async fn run_ticker(
    cfg: Arc<Config>,
    store: Arc<KeywordStore>,
    messenger: Arc<dyn MessagingPort>,
) {
    let Some(chat_id) = cfg.price_chat_id else {
        return;
    };
    let client = BinanceClient::new();
    let mut interval = tokio::time::interval(cfg.ticker_interval);

    println!(
        "[binance] ticker started: {} every {:?}",
        cfg.symbols.join(","),
        cfg.ticker_interval
    );

    loop {
        interval.tick().await;

        let mut infos = Vec::with_capacity(cfg.symbols.len());
        for symbol in &cfg.symbols {
            match client.fetch_ticker(symbol).await {
                Ok(info) => infos.push(info),
                Err(e) => eprintln!("[binance] {symbol}: {e}"),
            }
        }
        if infos.is_empty() {
            eprintln!("[binance] no prices fetched this round; skipping post");
            continue;
        }

        replace_summary(&store, messenger.as_ref(), chat_id, &infos).await;
    }
}

async fn replace_summary(
    store: &KeywordStore,
    messenger: &dyn MessagingPort,
    chat_id: i64,
    infos: &[TickerInfo],
) {
    // Drop the previous summary first so the chat never shows two.
    match store.get_config(LAST_MSG_KEY) {
        Ok(Some(raw)) => {
            if let Ok(old_id) = raw.parse::<i32>() {
                if let Err(e) = messenger.delete_message(message_ref(chat_id, old_id)).await {
                    eprintln!("[binance] failed to delete previous summary: {e}");
                }
            }
        }
        Ok(None) => {}
        Err(e) => eprintln!("[binance] failed to read last message id: {e}"),
    }

    let text = build_price_message(infos, Utc::now());
    match messenger.send_markdown(ChatId(chat_id), &text).await {
        Ok(sent) => {
            if let Err(e) = store.set_config(LAST_MSG_KEY, &sent.message_id.0.to_string()) {
                eprintln!("[binance] failed to persist last message id: {e}");
            }
        }
        Err(e) => eprintln!("[binance] failed to post summary: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_info_parses_from_api_json() {
        let price: PriceResponse =
            serde_json::from_str(r#"{"symbol": "BTCUSDT", "price": "64210.45000000"}"#).unwrap();
        let stats: DayStats = serde_json::from_str(
            r#"{
                "symbol": "BTCUSDT",
                "priceChange": "-94.99999800",
                "priceChangePercent": "-0.950",
                "lastPrice": "64115.45000000",
                "volume": "8913.30000000"
            }"#,
        )
        .unwrap();

        let info = build_info(price, stats).unwrap();
        assert_eq!(info.symbol, "BTCUSDT");
        assert!((info.last - 64210.45).abs() < 1e-9);
        assert!((info.change_percent - -0.95).abs() < 1e-9);
    }

    #[test]
    fn change_formatting_signs_and_arrows() {
        assert_eq!(format_change(1.234), "🔼 +1.23%");
        assert_eq!(format_change(-0.5), "🔽 -0.50%");
        assert_eq!(format_change(0.0), "➖ 0.00%");
    }

    #[test]
    fn price_message_lists_every_symbol() {
        let infos = vec![
            TickerInfo {
                symbol: "BTCUSDT".to_string(),
                last: 64210.45,
                change_percent: -0.95,
            },
            TickerInfo {
                symbol: "SHIBUSDT".to_string(),
                last: 0.0000175,
                change_percent: 2.0,
            },
        ];
        let msg = build_price_message(&infos, Utc::now());
        assert!(msg.contains("*BTCUSDT*: 64210.45 (🔽 -0.95%)"));
        assert!(msg.contains("*SHIBUSDT*: 0.000017 (🔼 +2.00%)"));
        assert!(msg.starts_with("*Market update "));
    }

    #[test]
    fn sub_unit_prices_keep_precision() {
        assert_eq!(format_price(0.00001750), "0.000018");
        assert_eq!(format_price(2.5), "2.50");
    }
}
