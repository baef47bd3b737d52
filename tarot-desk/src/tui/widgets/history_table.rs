// History tab: the logged-in user's readings, newest first.

use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Frame;

use super::clamp_scroll;
use crate::history::{HistoryRecord, InteractionKind};
use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let title = format!("History ({})", state.history.len());
    let block = Block::default().borders(Borders::ALL).title(title);

    if state.nickname.is_none() {
        frame.render_widget(
            Paragraph::new("Log in to see your readings.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    }
    if state.history.is_empty() {
        frame.render_widget(
            Paragraph::new("No readings yet.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    }

    let ordered = newest_first(&state.history);
    // border + header
    let visible_rows = area.height.saturating_sub(3) as usize;
    let offset = state.scroll_offset.get("history").copied().unwrap_or(0);
    let skip = clamp_scroll(offset, ordered.len(), visible_rows) as usize;

    let header = Row::new(vec![
        Cell::from("When"),
        Cell::from("Kind"),
        Cell::from("Query"),
        Cell::from("Cards"),
        Cell::from("Summary"),
    ])
    .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = ordered
        .into_iter()
        .skip(skip)
        .map(|record| {
            Row::new(vec![
                Cell::from(record.timestamp.clone()),
                Cell::from(record.kind.as_str()).style(kind_style(record.kind)),
                Cell::from(record.query.clone()),
                Cell::from(record.card_names().join(", ")),
                Cell::from(record.summary.clone()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(19),
        Constraint::Length(5),
        Constraint::Percentage(25),
        Constraint::Percentage(30),
        Constraint::Min(10),
    ];
    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

/// Records in display order: newest first.
pub fn newest_first(records: &[HistoryRecord]) -> Vec<&HistoryRecord> {
    records.iter().rev().collect()
}

fn kind_style(kind: InteractionKind) -> Style {
    match kind {
        InteractionKind::Tarot => Style::default().fg(Color::Magenta),
        InteractionKind::Stock => Style::default().fg(Color::Cyan),
    }
}
