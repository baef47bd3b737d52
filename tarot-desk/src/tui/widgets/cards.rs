// Drawn cards list: one line per card with its arcana and art source.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::protocol::DrawnCard;
use crate::tarot::art::ArtSource;

/// Rows needed to show `count` cards inside a border.
pub fn height_for(count: usize) -> u16 {
    count.max(1) as u16 + 2
}

pub fn render(frame: &mut Frame, area: Rect, cards: &[DrawnCard]) {
    let lines: Vec<Line> = if cards.is_empty() {
        vec![Line::from(Span::styled(
            " No cards drawn yet.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        cards
            .iter()
            .enumerate()
            .map(|(i, drawn)| card_line(i, drawn))
            .collect()
    };

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Cards ({})", cards.len())),
    );
    frame.render_widget(paragraph, area);
}

fn card_line(index: usize, drawn: &DrawnCard) -> Line<'static> {
    let name_style = if drawn.card.is_major() {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    let art_style = match drawn.art {
        ArtSource::Missing => Style::default().fg(Color::DarkGray),
        _ => Style::default().fg(Color::Gray),
    };
    Line::from(vec![
        Span::raw(format!(" {}. ", index + 1)),
        Span::styled(drawn.card.name(), name_style),
        Span::styled(format!("  {}", drawn.art.label()), art_style),
    ])
}
