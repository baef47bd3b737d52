// Technical indicators computed from a snapshot's close series.

use super::MarketSnapshot;
use crate::config::MarketConfig;

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
            Trend::Neutral => "neutral",
        }
    }
}

/// Indicator values; each is `None` when the series is too short.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicators {
    /// Percent change of the last close against the previous close.
    pub change_pct: Option<f64>,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub rsi: Option<f64>,
    pub trend: Trend,
}

impl Indicators {
    /// "overbought" / "oversold" / "neutral" reading of the RSI.
    pub fn rsi_zone(&self) -> Option<&'static str> {
        self.rsi.map(|rsi| {
            if rsi >= RSI_OVERBOUGHT {
                "overbought"
            } else if rsi <= RSI_OVERSOLD {
                "oversold"
            } else {
                "neutral"
            }
        })
    }
}

pub fn compute_indicators(snapshot: &MarketSnapshot, cfg: &MarketConfig) -> Indicators {
    let closes = &snapshot.closes;

    let change_pct = snapshot
        .previous_close
        .filter(|prev| *prev != 0.0)
        .map(|prev| (snapshot.close - prev) / prev * 100.0);

    let sma_short = sma(closes, cfg.sma_short);
    let sma_long = sma(closes, cfg.sma_long);
    let rsi = wilder_rsi(closes, cfg.rsi_period);
    let trend = classify_trend(snapshot.close, sma_short, sma_long);

    Indicators {
        change_pct,
        sma_short,
        sma_long,
        rsi,
        trend,
    }
}

/// Mean of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Relative strength index with Wilder smoothing. Needs `period + 1` values.
pub fn wilder_rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() <= period {
        return None;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let (seed, rest) = changes.split_at(period);

    let p = period as f64;
    let mut avg_gain = seed.iter().map(|c| c.max(0.0)).sum::<f64>() / p;
    let mut avg_loss = seed.iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;

    for change in rest {
        avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
    }

    if avg_loss == 0.0 {
        // Flat series has no direction.
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

fn classify_trend(close: f64, short: Option<f64>, long: Option<f64>) -> Trend {
    match (short, long) {
        (Some(s), Some(l)) if close > s && s > l => Trend::Bullish,
        (Some(s), Some(l)) if close < s && s < l => Trend::Bearish,
        _ => Trend::Neutral,
    }
}
