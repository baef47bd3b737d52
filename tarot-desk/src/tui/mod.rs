// TUI front end: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` that mirrors relevant parts of the application
// state. The app orchestrator pushes `UiUpdate` messages over an mpsc channel;
// the TUI applies them to `ViewState` and re-renders at ~30 fps.

pub mod input;
pub mod layout;
pub mod widgets;

use std::collections::HashMap;
use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use tokio::sync::mpsc;

use crate::history::{HistoryRecord, InteractionKind};
use crate::market::{Indicators, MarketSnapshot};
use crate::protocol::{DrawnCard, LlmStatus, Notice, TabId, UiUpdate, UserCommand};

use layout::{build_layout, AppLayout};

// ---------------------------------------------------------------------------
// InputMode
// ---------------------------------------------------------------------------

/// Which text field, if any, is capturing keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    EditingNickname,
    /// The question field of the active tab.
    EditingQuery,
    EditingSymbol,
}

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// TUI-local state that mirrors the application state for rendering.
///
/// Updated incrementally via `UiUpdate` messages from the app orchestrator
/// and locally by the input handler (fields, tabs, scroll).
#[derive(Default)]
pub struct ViewState {
    /// Logged-in nickname.
    pub nickname: Option<String>,
    pub sensitivity: f32,
    pub active_tab: TabId,
    pub input_mode: InputMode,

    // Text fields
    pub nickname_input: String,
    pub tarot_query: String,
    pub stock_symbol: String,
    pub stock_query: String,

    /// Kind of the reading shown in `cards` / `reading_text`.
    pub reading_kind: Option<InteractionKind>,
    pub cards: Vec<DrawnCard>,
    pub reading_text: String,
    pub reading_summary: Option<String>,
    pub reading_status: LlmStatus,

    // Stock tab data
    pub market_symbol: Option<String>,
    pub snapshot: Option<MarketSnapshot>,
    pub indicators: Option<Indicators>,

    /// The user's records in insertion order (oldest first).
    pub history: Vec<HistoryRecord>,
    /// Latest notice for the status bar.
    pub notice: Option<Notice>,
    /// Per-widget scroll offsets (keyed by widget name).
    pub scroll_offset: HashMap<String, usize>,
    /// Whether the quit confirmation dialog is showing.
    pub confirm_quit: bool,
}

impl ViewState {
    /// Whether the reading panel on `tab` should show the current reading.
    pub fn reading_on(&self, tab: TabId) -> bool {
        self.reading_kind.map(TabId::for_kind) == Some(tab)
    }

    fn clear_reading(&mut self) {
        self.reading_kind = None;
        self.cards.clear();
        self.reading_text.clear();
        self.reading_summary = None;
        self.reading_status = LlmStatus::Idle;
        self.market_symbol = None;
        self.snapshot = None;
        self.indicators = None;
    }
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
pub(crate) fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::SessionChanged { nickname } => {
            if nickname.is_none() {
                state.clear_reading();
                state.history.clear();
            }
            state.nickname = nickname;
        }
        UiUpdate::SensitivityChanged(value) => {
            state.sensitivity = value;
        }
        UiUpdate::CardsDrawn { kind, cards } => {
            // A new interaction replaces whatever was on screen.
            state.clear_reading();
            state.reading_kind = Some(kind);
            state.cards = cards;
            state.active_tab = TabId::for_kind(kind);
            state.scroll_offset.remove(input::reading_scroll_key(kind));
        }
        UiUpdate::MarketData {
            symbol,
            snapshot,
            indicators,
        } => {
            state.market_symbol = Some(symbol);
            state.snapshot = snapshot.map(|s| *s);
            state.indicators = indicators;
        }
        UiUpdate::ReadingStatus(status) => {
            state.reading_status = status;
        }
        UiUpdate::ReadingToken(token) => {
            state.reading_text.push_str(&token);
            state.reading_status = LlmStatus::Streaming;
        }
        UiUpdate::ReadingComplete { text, summary } => {
            state.reading_status = if summary.is_some() {
                LlmStatus::Complete
            } else {
                LlmStatus::Error
            };
            state.reading_text = text;
            state.reading_summary = summary;
        }
        UiUpdate::History(records) => {
            state.history = records;
        }
        UiUpdate::Notice(notice) => {
            state.notice = Some(notice);
        }
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

/// Render the complete frame.
pub(crate) fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, state);
    widgets::sidebar::render(frame, &layout, state);
    render_main_panel(frame, &layout, state);
    render_help_bar(frame, &layout, state);

    if state.confirm_quit {
        let busy = matches!(
            state.reading_status,
            LlmStatus::Fetching | LlmStatus::Streaming
        );
        widgets::quit_confirm::render(frame, frame.area(), busy);
    }
}

fn render_main_panel(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    match state.active_tab {
        TabId::Tarot => widgets::tarot_panel::render(frame, layout.main_panel, state),
        TabId::Stock => widgets::stock_panel::render(frame, layout.main_panel, state),
        TabId::History => widgets::history_table::render(frame, layout.main_panel, state),
    }
}

fn render_help_bar(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        help_text(state),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::DIM),
    )]))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, layout.help_bar);
}

/// Key hints for the current mode and tab.
pub(crate) fn help_text(state: &ViewState) -> &'static str {
    match state.input_mode {
        InputMode::EditingNickname => " Enter:Log in | Esc:Cancel",
        InputMode::EditingQuery | InputMode::EditingSymbol => match state.active_tab {
            TabId::Stock => " Enter:Analyze | Tab:Next field | Esc:Done",
            _ => " Enter:Draw | Esc:Done",
        },
        InputMode::Normal => match state.active_tab {
            TabId::Tarot => {
                " q:Quit | 1-3:Tabs | l/L:Login/out | i:Question | Enter:Draw | +/-:Sensitivity"
            }
            TabId::Stock => {
                " q:Quit | 1-3:Tabs | s:Symbol | i:Question | Enter:Analyze | +/-:Sensitivity"
            }
            TabId::History => " q:Quit | 1-3:Tabs | r:Refresh | j/k:Scroll | l/L:Login/out",
        },
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// This is the main entry point for the terminal UI. It:
/// 1. Initializes the terminal (enters raw mode, enables alternate screen).
/// 2. Installs a panic hook to restore the terminal on crash.
/// 3. Runs an async select loop: UI updates, keyboard input, render ticks.
/// 4. Restores the terminal on clean exit.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    // Channel closed: app is shutting down
                    None => break,
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            let _ = cmd_tx.send(cmd).await;
                            if quit {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => {
                        let _ = cmd_tx.send(UserCommand::Quit).await;
                        break;
                    }
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| render_frame(frame, &view_state))?;
            }
        }
    }

    ratatui::restore();

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::sample_record;
    use crate::protocol::NoticeLevel;
    use crate::tarot::art::ArtSource;
    use crate::tarot::deck::Card;

    fn drawn(n: u8) -> DrawnCard {
        DrawnCard {
            card: Card::Major(n),
            art: ArtSource::Missing,
        }
    }

    fn buffer_text(terminal: &ratatui::Terminal<ratatui::backend::TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    #[test]
    fn view_state_default_is_sensible() {
        let state = ViewState::default();
        assert!(state.nickname.is_none());
        assert_eq!(state.active_tab, TabId::Tarot);
        assert_eq!(state.input_mode, InputMode::Normal);
        assert_eq!(state.reading_status, LlmStatus::Idle);
        assert!(state.cards.is_empty());
        assert!(state.history.is_empty());
        assert!(!state.confirm_quit);
    }

    #[test]
    fn cards_drawn_resets_reading_and_switches_tab() {
        let mut state = ViewState::default();
        state.reading_text = "old".into();
        state.reading_summary = Some("old".into());
        state.scroll_offset.insert("stock_reading".into(), 9);

        apply_ui_update(
            &mut state,
            UiUpdate::CardsDrawn {
                kind: InteractionKind::Stock,
                cards: vec![drawn(0), drawn(1)],
            },
        );

        assert_eq!(state.active_tab, TabId::Stock);
        assert_eq!(state.cards.len(), 2);
        assert!(state.reading_text.is_empty());
        assert!(state.reading_summary.is_none());
        assert!(state.scroll_offset.get("stock_reading").is_none());
        assert!(state.reading_on(TabId::Stock));
        assert!(!state.reading_on(TabId::Tarot));
    }

    #[test]
    fn tokens_accumulate_then_complete_replaces_text() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::ReadingToken("Hello ".into()));
        apply_ui_update(&mut state, UiUpdate::ReadingToken("World".into()));
        assert_eq!(state.reading_text, "Hello World");
        assert_eq!(state.reading_status, LlmStatus::Streaming);

        apply_ui_update(
            &mut state,
            UiUpdate::ReadingComplete {
                text: "Hello World\n### Summary\nHi.".into(),
                summary: Some("Hi.".into()),
            },
        );
        assert_eq!(state.reading_status, LlmStatus::Complete);
        assert_eq!(state.reading_summary.as_deref(), Some("Hi."));
    }

    #[test]
    fn complete_without_summary_is_error_state() {
        let mut state = ViewState::default();
        apply_ui_update(
            &mut state,
            UiUpdate::ReadingComplete {
                text: "analysis unavailable".into(),
                summary: None,
            },
        );
        assert_eq!(state.reading_status, LlmStatus::Error);
        assert_eq!(state.reading_text, "analysis unavailable");
    }

    #[test]
    fn logout_clears_reading_and_history() {
        let mut state = ViewState::default();
        apply_ui_update(
            &mut state,
            UiUpdate::SessionChanged {
                nickname: Some("ana".into()),
            },
        );
        apply_ui_update(&mut state, UiUpdate::History(vec![sample_record("ana", "q")]));
        apply_ui_update(
            &mut state,
            UiUpdate::CardsDrawn {
                kind: InteractionKind::Tarot,
                cards: vec![drawn(3)],
            },
        );

        apply_ui_update(&mut state, UiUpdate::SessionChanged { nickname: None });
        assert!(state.nickname.is_none());
        assert!(state.history.is_empty());
        assert!(state.cards.is_empty());
        assert!(state.reading_kind.is_none());
    }

    #[test]
    fn market_data_unboxes_snapshot() {
        let mut state = ViewState::default();
        apply_ui_update(
            &mut state,
            UiUpdate::MarketData {
                symbol: "AAPL".into(),
                snapshot: None,
                indicators: None,
            },
        );
        assert_eq!(state.market_symbol.as_deref(), Some("AAPL"));
        assert!(state.snapshot.is_none());
    }

    #[test]
    fn notice_and_sensitivity_are_stored() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::SensitivityChanged(0.4));
        apply_ui_update(&mut state, UiUpdate::Notice(Notice::error("boom")));
        assert!((state.sensitivity - 0.4).abs() < f32::EPSILON);
        assert_eq!(state.notice.as_ref().unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn help_text_follows_mode() {
        let mut state = ViewState::default();
        assert!(help_text(&state).contains("Enter:Draw"));
        state.active_tab = TabId::Stock;
        assert!(help_text(&state).contains("s:Symbol"));
        state.input_mode = InputMode::EditingNickname;
        assert!(help_text(&state).contains("Log in"));
    }

    #[test]
    fn render_frame_all_tabs() {
        for tab in TabId::ALL {
            let backend = ratatui::backend::TestBackend::new(120, 40);
            let mut terminal = ratatui::Terminal::new(backend).unwrap();
            let mut state = ViewState::default();
            state.active_tab = tab;
            state.nickname = Some("ana".into());
            state.history = vec![sample_record("ana", "first")];
            terminal
                .draw(|frame| render_frame(frame, &state))
                .unwrap();
            let text = buffer_text(&terminal);
            assert!(text.contains("ana"), "nickname missing on {tab:?}");
        }
    }

    #[test]
    fn render_frame_with_quit_dialog() {
        let backend = ratatui::backend::TestBackend::new(80, 24);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let mut state = ViewState::default();
        state.confirm_quit = true;
        terminal
            .draw(|frame| render_frame(frame, &state))
            .unwrap();
        assert!(buffer_text(&terminal).contains("Really quit?"));
    }
}
