// Sidebar: login box, sensitivity slider, and a short key reference.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

use super::text_field;
use crate::tui::layout::AppLayout;
use crate::tui::{InputMode, ViewState};

pub fn render(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    render_login(frame, layout.login, state);
    frame.render_widget(sensitivity_gauge(state.sensitivity), layout.sensitivity);
    render_keys(frame, layout.sidebar_info);
}

fn render_login(frame: &mut Frame, area: Rect, state: &ViewState) {
    if state.input_mode == InputMode::EditingNickname {
        let field = text_field("Nickname", &state.nickname_input, true, "");
        frame.render_widget(field, area);
        return;
    }

    let lines = match &state.nickname {
        Some(nickname) => vec![
            Line::from(vec![
                Span::styled(" ", Style::default()),
                Span::styled(
                    nickname.clone(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(Span::styled(
                format!(" {} readings", state.history.len()),
                Style::default().fg(Color::Gray),
            )),
        ],
        None => vec![
            Line::from(Span::styled(" Not logged in", Style::default().fg(Color::Gray))),
            Line::from(Span::styled(" l to log in", Style::default().fg(Color::DarkGray))),
        ],
    };

    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Session"));
    frame.render_widget(paragraph, area);
}

/// Slider for the sampling temperature, labelled with its value.
pub fn sensitivity_gauge(value: f32) -> Gauge<'static> {
    let ratio = f64::from(value).clamp(0.0, 1.0);
    Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Sensitivity (+/-)"),
        )
        .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Black))
        .ratio(ratio)
        .label(format!("{value:.1}"))
}

fn render_keys(frame: &mut Frame, area: Rect) {
    let keys = [
        ("1-3/Tab", "switch tab"),
        ("i", "question"),
        ("s", "ticker symbol"),
        ("Enter", "draw / analyze"),
        ("r", "reload history"),
        ("L", "log out"),
        ("j/k", "scroll"),
    ];
    let lines: Vec<Line> = keys
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(format!(" {key:<8}"), Style::default().fg(Color::Yellow)),
                Span::styled(*what, Style::default().fg(Color::Gray)),
            ])
        })
        .collect();
    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Keys"));
    frame.render_widget(paragraph, area);
}
