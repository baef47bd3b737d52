// Market data: snapshot types, the source trait, and symbol handling.

pub mod client;
pub mod indicators;

use async_trait::async_trait;
pub use client::MarketClient;
pub use indicators::{compute_indicators, Indicators, Trend};

/// Latest daily bar for a symbol plus the close series used for indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub currency: Option<String>,
    /// Bar date, `%Y-%m-%d`.
    pub as_of: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
    pub previous_close: Option<f64>,
    /// Non-null closes, oldest first. The last entry equals `close`.
    pub closes: Vec<f64>,
}

/// Anything that can produce a snapshot for a symbol.
///
/// `Ok(None)` means the source answered but had no data for the symbol.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    async fn fetch(&self, symbol: &str) -> anyhow::Result<Option<MarketSnapshot>>;
}

/// Trim and uppercase a ticker. Returns `None` for blank input or input
/// containing characters no exchange ticker uses.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return None;
    }
    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    valid.then_some(symbol)
}
