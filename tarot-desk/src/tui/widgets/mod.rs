// TUI widget modules for each panel.

pub mod cards;
pub mod history_table;
pub mod quit_confirm;
pub mod reading;
pub mod sidebar;
pub mod status_bar;
pub mod stock_panel;
pub mod tarot_panel;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

/// A one-line text input box. The active field gets a yellow border and a
/// trailing cursor block.
pub fn text_field<'a>(title: &'a str, value: &'a str, active: bool, hint: &'a str) -> Paragraph<'a> {
    let border = if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let line = if value.is_empty() && !active {
        Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))
    } else if active {
        Line::from(vec![
            Span::raw(value),
            Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)),
        ])
    } else {
        Line::from(Span::raw(value))
    };

    Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title),
    )
}

/// Clamp a stored scroll offset so the last page stays visible.
pub fn clamp_scroll(offset: usize, total_lines: usize, visible_rows: usize) -> u16 {
    let max_offset = total_lines.saturating_sub(visible_rows);
    offset.min(max_offset).min(u16::MAX as usize) as u16
}
