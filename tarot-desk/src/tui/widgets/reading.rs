// Reading panel: the streamed model text for the current interaction.
//
// Header: "Reading -- fetching market data.../streaming.../complete/error"
// Auto-scrolls to the bottom while streaming; the summary sits in the
// bottom border once the reading completes.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use super::clamp_scroll;
use crate::history::InteractionKind;
use crate::protocol::{LlmStatus, TabId};
use crate::tui::input::reading_scroll_key;
use crate::tui::ViewState;

/// Render the reading for `kind`. Shows a placeholder when the current
/// reading belongs to the other tab.
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState, kind: InteractionKind) {
    let own = state.reading_on(TabId::for_kind(kind));
    let status = if own { state.reading_status } else { LlmStatus::Idle };

    let content = if own && !state.reading_text.is_empty() {
        state.reading_text.clone()
    } else {
        placeholder_text(status, kind).to_string()
    };

    let inner_height = area.height.saturating_sub(2) as usize;
    let line_count = content.lines().count();
    let offset = if status == LlmStatus::Streaming {
        usize::MAX
    } else {
        state
            .scroll_offset
            .get(reading_scroll_key(kind))
            .copied()
            .unwrap_or(0)
    };
    let scroll = clamp_scroll(offset, line_count, inner_height);

    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(build_title(status))
        .border_style(border_style(status));
    if let (true, Some(summary)) = (own, &state.reading_summary) {
        block = block.title_bottom(Line::from(Span::styled(
            format!(" {summary} "),
            Style::default().fg(Color::Cyan),
        )));
    }

    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn build_title(status: LlmStatus) -> Line<'static> {
    let (status_text, status_color) = status_indicator(status);
    Line::from(vec![
        Span::styled("Reading", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(" -- ", Style::default().fg(Color::DarkGray)),
        Span::styled(status_text, Style::default().fg(status_color)),
    ])
}

/// Return status text and color for the reading status.
pub fn status_indicator(status: LlmStatus) -> (&'static str, Color) {
    match status {
        LlmStatus::Idle => ("idle", Color::DarkGray),
        LlmStatus::Fetching => ("fetching market data...", Color::Blue),
        LlmStatus::Streaming => ("streaming...", Color::Yellow),
        LlmStatus::Complete => ("complete", Color::Green),
        LlmStatus::Error => ("error", Color::Red),
    }
}

fn border_style(status: LlmStatus) -> Style {
    match status {
        LlmStatus::Streaming => Style::default().fg(Color::Yellow),
        LlmStatus::Error => Style::default().fg(Color::Red),
        _ => Style::default(),
    }
}

fn placeholder_text(status: LlmStatus, kind: InteractionKind) -> &'static str {
    match (status, kind) {
        (LlmStatus::Idle, InteractionKind::Tarot) => "Ask a question and press Enter to draw.",
        (LlmStatus::Idle, InteractionKind::Stock) => "Enter a ticker symbol and press Enter.",
        (LlmStatus::Fetching, _) => "Fetching market data...",
        (LlmStatus::Streaming, _) => "Consulting the cards...",
        (LlmStatus::Complete, _) => "Reading complete (empty).",
        (LlmStatus::Error, _) => "Reading failed.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_text(state: &ViewState, kind: InteractionKind, height: u16) -> String {
        let backend = ratatui::backend::TestBackend::new(60, height);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), state, kind))
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
    fn status_indicator_values() {
        assert_eq!(status_indicator(LlmStatus::Idle).0, "idle");
        assert_eq!(status_indicator(LlmStatus::Fetching).1, Color::Blue);
        assert_eq!(status_indicator(LlmStatus::Streaming).0, "streaming...");
        assert_eq!(status_indicator(LlmStatus::Complete).1, Color::Green);
        assert_eq!(status_indicator(LlmStatus::Error).1, Color::Red);
    }

    #[test]
    fn placeholder_per_tab() {
        let state = ViewState::default();
        assert!(render_text(&state, InteractionKind::Tarot, 6).contains("press Enter to draw"));
        assert!(render_text(&state, InteractionKind::Stock, 6).contains("ticker symbol"));
    }

    #[test]
    fn reading_stays_on_its_own_tab() {
        let mut state = ViewState::default();
        state.reading_kind = Some(InteractionKind::Tarot);
        state.reading_text = "The Star shines.".into();
        state.reading_status = LlmStatus::Complete;
        state.reading_summary = Some("Hope returns.".into());

        let tarot = render_text(&state, InteractionKind::Tarot, 6);
        assert!(tarot.contains("The Star shines."));
        assert!(tarot.contains("Hope returns."));
        assert!(tarot.contains("complete"));

        let stock = render_text(&state, InteractionKind::Stock, 6);
        assert!(!stock.contains("The Star shines."));
    }

    #[test]
    fn streaming_auto_scrolls_to_bottom() {
        let mut state = ViewState::default();
        state.reading_kind = Some(InteractionKind::Tarot);
        state.reading_status = LlmStatus::Streaming;
        state.reading_text = (0..30)
            .map(|i| format!("Line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let text = render_text(&state, InteractionKind::Tarot, 5);
        assert!(text.contains("Line 29"));
        assert!(!text.contains("Line 0 "));
    }

    #[test]
    fn streaming_ignores_manual_offset() {
        let mut state = ViewState::default();
        state.reading_kind = Some(InteractionKind::Tarot);
        state.reading_status = LlmStatus::Streaming;
        state.reading_text = (0..30)
            .map(|i| format!("Line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        state.scroll_offset.insert("tarot_reading".into(), 0);
        let text = render_text(&state, InteractionKind::Tarot, 5);
        assert!(text.contains("Line 29"));
    }
}
