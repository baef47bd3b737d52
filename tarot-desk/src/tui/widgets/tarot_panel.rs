// Tarot tab: question field, drawn cards, streamed reading.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::Frame;

use super::{cards, reading, text_field};
use crate::history::InteractionKind;
use crate::protocol::TabId;
use crate::tui::{InputMode, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let shown_cards = if state.reading_on(TabId::Tarot) {
        state.cards.as_slice()
    } else {
        &[]
    };

    let [query_area, cards_area, reading_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(cards::height_for(shown_cards.len())),
        Constraint::Min(3),
    ])
    .areas(area);

    let editing = state.input_mode == InputMode::EditingQuery;
    frame.render_widget(
        text_field("Question", &state.tarot_query, editing, "press i to ask a question"),
        query_area,
    );
    cards::render(frame, cards_area, shown_cards);
    reading::render(frame, reading_area, state, InteractionKind::Tarot);
}
