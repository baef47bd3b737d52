// Status bar widget: session indicator, tab bar, latest notice.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::protocol::{NoticeLevel, TabId};
use crate::tui::ViewState;

/// Render the status bar into the given area.
///
/// Layout: [session indicator] [tab bar] [notice]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut spans = Vec::new();

    let (dot, dot_color) = session_indicator(state.nickname.is_some());
    spans.push(Span::styled(format!(" {} ", dot), Style::default().fg(dot_color)));
    spans.push(Span::styled(
        state.nickname.clone().unwrap_or_else(|| "not logged in".to_string()),
        Style::default().fg(Color::White),
    ));
    spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));

    spans.extend(tab_spans(state.active_tab));

    if let Some(notice) = &state.notice {
        spans.push(Span::styled("| ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled(
            notice.text.clone(),
            Style::default().fg(notice_color(notice.level)),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Return the session dot character and its color.
pub fn session_indicator(logged_in: bool) -> (&'static str, Color) {
    if logged_in {
        ("●", Color::Green)
    } else {
        ("●", Color::Red)
    }
}

pub fn notice_color(level: NoticeLevel) -> Color {
    match level {
        NoticeLevel::Info => Color::Cyan,
        NoticeLevel::Warning => Color::Yellow,
        NoticeLevel::Error => Color::Red,
    }
}

/// Build tab indicator spans with the active tab highlighted.
/// E.g. "[1:Tarot] [2:Stock] [3:History]"
pub fn tab_spans(active: TabId) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for (i, tab_id) in TabId::ALL.into_iter().enumerate() {
        let style = if tab_id == active {
            Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(format!("[{}:{}]", i + 1, tab_id.title()), style));
        spans.push(Span::raw(" "));
    }
    spans
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
