// Stock tab: symbol and question fields, market snapshot table with an RSI
// gauge, drawn cards, streamed reading.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table};
use ratatui::Frame;

use super::{cards, reading, text_field};
use crate::history::InteractionKind;
use crate::market::indicators::{RSI_OVERBOUGHT, RSI_OVERSOLD};
use crate::market::{Indicators, MarketSnapshot, Trend};
use crate::protocol::TabId;
use crate::tui::{InputMode, ViewState};

/// Rows of the market table including its border.
const MARKET_HEIGHT: u16 = 7;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let own = state.reading_on(TabId::Stock);
    let shown_cards = if own { state.cards.as_slice() } else { &[] };

    let [fields_area, market_area, cards_area, reading_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(MARKET_HEIGHT),
        Constraint::Length(cards::height_for(shown_cards.len())),
        Constraint::Min(3),
    ])
    .areas(area);

    let [symbol_area, query_area] =
        Layout::horizontal([Constraint::Length(16), Constraint::Min(10)]).areas(fields_area);
    frame.render_widget(
        text_field(
            "Symbol",
            &state.stock_symbol,
            state.input_mode == InputMode::EditingSymbol,
            "press s",
        ),
        symbol_area,
    );
    frame.render_widget(
        text_field(
            "Question",
            &state.stock_query,
            state.input_mode == InputMode::EditingQuery,
            "press i (optional)",
        ),
        query_area,
    );

    render_market(frame, market_area, state, own);
    cards::render(frame, cards_area, shown_cards);
    reading::render(frame, reading_area, state, InteractionKind::Stock);
}

fn render_market(frame: &mut Frame, area: Rect, state: &ViewState, own: bool) {
    let title = match (&state.market_symbol, own) {
        (Some(symbol), true) => format!("Market: {symbol}"),
        _ => "Market".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    let snapshot = state.snapshot.as_ref().filter(|_| own);
    let Some(snap) = snapshot else {
        let text = if own && state.market_symbol.is_some() {
            "No market data available."
        } else {
            ""
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)).block(block),
            area,
        );
        return;
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let [table_area, gauge_area] =
        Layout::horizontal([Constraint::Min(30), Constraint::Length(24)]).areas(inner);

    frame.render_widget(snapshot_table(snap, state.indicators.as_ref()), table_area);
    if let Some(rsi) = state.indicators.as_ref().and_then(|i| i.rsi) {
        frame.render_widget(rsi_gauge(rsi), gauge_area);
    }
}

/// Key/value rows for the snapshot and its indicators.
pub fn snapshot_table(snap: &MarketSnapshot, indicators: Option<&Indicators>) -> Table<'static> {
    let currency = snap.currency.clone().unwrap_or_default();
    let mut rows = vec![
        Row::new(vec![
            Cell::from("Close"),
            Cell::from(format!("{:.2} {currency}", snap.close)),
            Cell::from("As of"),
            Cell::from(snap.as_of.clone()),
        ]),
        Row::new(vec![
            Cell::from("Open"),
            Cell::from(format!("{:.2}", snap.open)),
            Cell::from("High/Low"),
            Cell::from(format!("{:.2}/{:.2}", snap.high, snap.low)),
        ]),
    ];

    if let Some(ind) = indicators {
        let change_color = match ind.change_pct {
            Some(c) if c > 0.0 => Color::Green,
            Some(c) if c < 0.0 => Color::Red,
            _ => Color::White,
        };
        rows.push(Row::new(vec![
            Cell::from("Change"),
            Cell::from(fmt_opt(ind.change_pct, |v| format!("{v:+.2}%")))
                .style(Style::default().fg(change_color)),
            Cell::from("Trend"),
            Cell::from(ind.trend.label()).style(Style::default().fg(trend_color(ind.trend))),
        ]));
        rows.push(Row::new(vec![
            Cell::from("SMA s/l"),
            Cell::from(format!(
                "{}/{}",
                fmt_opt(ind.sma_short, |v| format!("{v:.2}")),
                fmt_opt(ind.sma_long, |v| format!("{v:.2}"))
            )),
            Cell::from("Volume"),
            Cell::from(fmt_opt(snap.volume, |v| v.to_string())),
        ]));
    }

    Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Min(12),
            Constraint::Length(9),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec![
            Cell::from(""),
            Cell::from(snap.symbol.clone()),
            Cell::from(""),
            Cell::from(""),
        ])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
}

/// RSI gauge coloured by zone.
pub fn rsi_gauge(rsi: f64) -> Gauge<'static> {
    Gauge::default()
        .block(Block::default().title(Line::from("RSI")))
        .gauge_style(Style::default().fg(rsi_color(rsi)).bg(Color::Black))
        .ratio((rsi / 100.0).clamp(0.0, 1.0))
        .label(format!("{rsi:.1}"))
}

pub fn rsi_color(rsi: f64) -> Color {
    if rsi >= RSI_OVERBOUGHT {
        Color::Red
    } else if rsi <= RSI_OVERSOLD {
        Color::Green
    } else {
        Color::Yellow
    }
}

fn trend_color(trend: Trend) -> Color {
    match trend {
        Trend::Bullish => Color::Green,
        Trend::Bearish => Color::Red,
        Trend::Neutral => Color::Gray,
    }
}

fn fmt_opt<T>(value: Option<T>, f: impl Fn(T) -> String) -> String {
    value.map(f).unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "AAPL".into(),
            currency: Some("USD".into()),
            as_of: "2026-03-03".into(),
            open: 183.0,
            high: 186.5,
            low: 182.0,
            close: 185.0,
            volume: Some(6_100_000),
            previous_close: Some(182.5),
            closes: vec![182.5, 185.0],
        }
    }

    fn render_text(state: &ViewState) -> String {
        let backend = ratatui::backend::TestBackend::new(100, 30);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), state))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn rsi_colors_follow_zones() {
        assert_eq!(rsi_color(75.0), Color::Red);
        assert_eq!(rsi_color(25.0), Color::Green);
        assert_eq!(rsi_color(50.0), Color::Yellow);
    }

    #[test]
    fn renders_snapshot_and_indicators() {
        let mut state = ViewState::default();
        state.active_tab = TabId::Stock;
        state.stock_symbol = "aapl".into();
        state.reading_kind = Some(InteractionKind::Stock);
        state.market_symbol = Some("AAPL".into());
        state.snapshot = Some(snapshot());
        state.indicators = Some(Indicators {
            change_pct: Some(1.37),
            sma_short: Some(184.0),
            sma_long: None,
            rsi: Some(64.2),
            trend: Trend::Bullish,
        });

        let text = render_text(&state);
        assert!(text.contains("Market: AAPL"));
        assert!(text.contains("185.00 USD"));
        assert!(text.contains("+1.37%"));
        assert!(text.contains("184.00/n/a"));
        assert!(text.contains("bullish"));
        assert!(text.contains("64.2"));
    }

    #[test]
    fn missing_data_is_stated() {
        let mut state = ViewState::default();
        state.reading_kind = Some(InteractionKind::Stock);
        state.market_symbol = Some("ZZZZ".into());
        let text = render_text(&state);
        assert!(text.contains("No market data available."));
    }

    #[test]
    fn tarot_reading_does_not_leak_into_stock_tab() {
        let mut state = ViewState::default();
        state.reading_kind = Some(InteractionKind::Tarot);
        state.snapshot = Some(snapshot());
        let text = render_text(&state);
        assert!(!text.contains("185.00"));
    }
}
