// Prompt templates for tarot readings and stock readings.
//
// Prompts are plain markdown sections. Market numbers are pre-computed so
// the model interprets them instead of doing arithmetic.

use crate::history::HistoryRecord;
use crate::llm::summary::SUMMARY_MARKER;
use crate::market::{Indicators, MarketSnapshot};
use crate::tarot::deck::Card;

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

/// Static system prompt shared by both reading kinds.
pub fn system_prompt() -> String {
    format!(
        "You are a warm, perceptive tarot reader who also follows the stock market.\n\
         \n\
         For every reading:\n\
         1. Interpret each drawn card in the context of the querent's question.\n\
         2. Weave the cards together into one coherent message.\n\
         3. When market data is provided, relate the cards to the numbers given. \
         Never invent prices, and remind the querent this is not financial advice.\n\
         \n\
         Answer in markdown. Refer to earlier readings only when they are relevant.\n\
         End every answer with a line `{SUMMARY_MARKER}` followed by a single sentence \
         of at most 20 words that captures the reading."
    )
}

// ---------------------------------------------------------------------------
// Reading prompts
// ---------------------------------------------------------------------------

/// User prompt for a tarot reading.
pub fn build_tarot_prompt(
    nickname: &str,
    query: &str,
    cards: &[Card],
    recent_history: &[HistoryRecord],
) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(&format!("## QUERENT\n{nickname}\n\n"));
    prompt.push_str(&format!("## QUESTION\n{}\n\n", question_or_default(query)));
    prompt.push_str("## CARDS\n");
    prompt.push_str(&format_cards(cards));
    prompt.push('\n');
    prompt.push_str("## RECENT READINGS\n");
    prompt.push_str(&format_history_for_prompt(recent_history));

    prompt
}

/// User prompt for a stock reading. A missing snapshot is stated explicitly
/// so the model does not make up numbers.
pub fn build_stock_prompt(
    nickname: &str,
    symbol: &str,
    query: &str,
    cards: &[Card],
    snapshot: Option<&MarketSnapshot>,
    indicators: Option<&Indicators>,
    recent_history: &[HistoryRecord],
) -> String {
    let mut prompt = String::with_capacity(1536);

    prompt.push_str(&format!("## QUERENT\n{nickname}\n\n"));
    prompt.push_str(&format!("## SYMBOL\n{symbol}\n\n"));
    prompt.push_str(&format!("## QUESTION\n{}\n\n", question_or_default(query)));
    prompt.push_str("## MARKET DATA\n");
    match snapshot {
        Some(snap) => prompt.push_str(&format_market(snap, indicators)),
        None => prompt.push_str("No market data available for this symbol.\n"),
    }
    prompt.push('\n');
    prompt.push_str("## CARDS\n");
    prompt.push_str(&format_cards(cards));
    prompt.push('\n');
    prompt.push_str("## RECENT READINGS\n");
    prompt.push_str(&format_history_for_prompt(recent_history));

    prompt
}

// ---------------------------------------------------------------------------
// Section formatters
// ---------------------------------------------------------------------------

/// One line per earlier record: `- [timestamp] kind "query": cards -> summary`.
pub fn format_history_for_prompt(records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "None.\n".to_string();
    }
    let mut out = String::new();
    for r in records {
        out.push_str(&format!(
            "- [{}] {} \"{}\": {} -> {}\n",
            r.timestamp,
            r.kind,
            r.query,
            r.card_names().join(", "),
            r.summary
        ));
    }
    out
}

fn format_cards(cards: &[Card]) -> String {
    cards
        .iter()
        .enumerate()
        .map(|(i, card)| {
            let arcana = if card.is_major() { "major" } else { "minor" };
            format!("{}. {} ({arcana} arcana)\n", i + 1, card.name())
        })
        .collect()
}

fn format_market(snap: &MarketSnapshot, indicators: Option<&Indicators>) -> String {
    let currency = snap.currency.as_deref().unwrap_or("");
    let mut out = format!(
        "As of {}: close {:.2} {currency} (open {:.2}, high {:.2}, low {:.2})\n",
        snap.as_of, snap.close, snap.open, snap.high, snap.low
    );
    if let Some(volume) = snap.volume {
        out.push_str(&format!("Volume: {volume}\n"));
    }
    let Some(ind) = indicators else {
        return out;
    };
    out.push_str(&format!("Change vs previous close: {}\n", fmt_pct(ind.change_pct)));
    out.push_str(&format!(
        "SMA short: {} | SMA long: {} | Trend: {}\n",
        fmt_num(ind.sma_short),
        fmt_num(ind.sma_long),
        ind.trend.label()
    ));
    match (ind.rsi, ind.rsi_zone()) {
        (Some(rsi), Some(zone)) => out.push_str(&format!("RSI: {rsi:.1} ({zone})\n")),
        _ => out.push_str("RSI: n/a\n"),
    }
    out
}

fn question_or_default(query: &str) -> &str {
    let q = query.trim();
    if q.is_empty() {
        "(no specific question; give a general reading)"
    } else {
        q
    }
}

fn fmt_num(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map(|x| format!("{x:+.2}%")).unwrap_or_else(|| "n/a".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
