// Chart-endpoint market data client.
//
// Fetches `{base_url}/{symbol}?range=..&interval=..` and reduces the chart
// payload to a `MarketSnapshot`. Quote arrays in this payload carry nulls
// for halted or missing bars; those are skipped.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{MarketSnapshot, MarketSource};
use crate::config::MarketConfig;

const USER_AGENT: &str = concat!("tarot-desk/", env!("CARGO_PKG_VERSION"));

pub struct MarketClient {
    http: reqwest::Client,
    base_url: String,
    range: String,
    interval: String,
}

impl MarketClient {
    pub fn new(cfg: &MarketConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            range: cfg.range.clone(),
            interval: cfg.interval.clone(),
        }
    }

    /// Fetch the latest snapshot for an already-normalized symbol.
    ///
    /// An unknown symbol (HTTP 404) or a payload without usable bars is
    /// `Ok(None)`. Transport failures and other error statuses are `Err`.
    pub async fn fetch(&self, symbol: &str) -> anyhow::Result<Option<MarketSnapshot>> {
        let url = format!("{}/{}", self.base_url, symbol);
        debug!("Fetching market data from {}", url);

        let response = self
            .http
            .get(&url)
            .query(&[("range", self.range.as_str()), ("interval", self.interval.as_str())])
            .header("user-agent", USER_AGENT)
            .send()
            .await
            .with_context(|| format!("market request for {symbol} failed"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            info!("No market data for {} (404)", symbol);
            return Ok(None);
        }
        if !status.is_success() {
            anyhow::bail!("market API returned status {status} for {symbol}");
        }

        let body = response
            .text()
            .await
            .context("failed to read market response body")?;
        Ok(parse_chart_response(symbol, &body))
    }
}

#[async_trait]
impl MarketSource for MarketClient {
    fn name(&self) -> &'static str {
        "chart"
    }

    async fn fetch(&self, symbol: &str) -> anyhow::Result<Option<MarketSnapshot>> {
        MarketClient::fetch(self, symbol).await
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

/// Reduce a chart payload to a snapshot of its last non-null bar.
///
/// Expected shape:
/// `{ "chart": { "result": [ { "meta": {..}, "timestamp": [..],
///   "indicators": { "quote": [ { "open": [..], "high": [..], "low": [..],
///   "close": [..], "volume": [..] } ] } } ], "error": null } }`
pub fn parse_chart_response(symbol: &str, body: &str) -> Option<MarketSnapshot> {
    let v: Value = serde_json::from_str(body).ok()?;
    let result = v.get("chart")?.get("result")?.get(0)?;
    let meta = result.get("meta");
    let quote = result.get("indicators")?.get("quote")?.get(0)?;

    let series = |name: &str| -> Vec<Option<f64>> {
        quote
            .get(name)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(Value::as_f64).collect())
            .unwrap_or_default()
    };
    let raw_closes = series("close");
    let opens = series("open");
    let highs = series("high");
    let lows = series("low");

    let last = raw_closes.iter().rposition(Option::is_some)?;
    let close = raw_closes[last]?;
    let at = |values: &[Option<f64>]| values.get(last).copied().flatten().unwrap_or(close);

    let closes: Vec<f64> = raw_closes.iter().flatten().copied().collect();
    let previous_close = if closes.len() >= 2 {
        Some(closes[closes.len() - 2])
    } else {
        meta.and_then(|m| m.get("chartPreviousClose"))
            .and_then(Value::as_f64)
    };

    let volume = quote
        .get("volume")
        .and_then(|v| v.get(last))
        .and_then(Value::as_u64);

    let as_of = result
        .get("timestamp")
        .and_then(|t| t.get(last))
        .and_then(Value::as_i64)
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    let currency = meta
        .and_then(|m| m.get("currency"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let symbol = meta
        .and_then(|m| m.get("symbol"))
        .and_then(Value::as_str)
        .unwrap_or(symbol)
        .to_string();

    Some(MarketSnapshot {
        symbol,
        currency,
        as_of,
        open: at(&opens),
        high: at(&highs),
        low: at(&lows),
        close,
        volume,
        previous_close,
        closes,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
