// Quit confirmation overlay, drawn on top of everything when
// `ViewState::confirm_quit` is set.

use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

const DIALOG_WIDTH: u16 = 34;

/// Render the dialog centered in `area`. When a reading is still running,
/// an extra line warns that it will be dropped unsaved.
pub fn render(frame: &mut Frame, area: Rect, reading_in_progress: bool) {
    let mut lines = vec![Line::from(vec![
        Span::raw(" Really quit? ("),
        Span::styled("y", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw("/"),
        Span::styled("n", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw(")"),
    ])];
    if reading_in_progress {
        lines.push(Line::from(Span::styled(
            " The current reading is lost.",
            Style::default().fg(Color::Yellow),
        )));
    }

    let height = lines.len() as u16 + 2;
    let dialog_area = centered_rect(DIALOG_WIDTH, height, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(
            " Quit ",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, dialog_area);
}

/// A `width` x `height` rectangle centered in `area`, clamped to fit.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .split(area);
    Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .split(vertical[0])[0]
}
