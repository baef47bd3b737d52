// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into UserCommand messages sent to the
// app orchestrator, or into local ViewState mutations (tab switching,
// text fields, scrolling).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::{InputMode, ViewState};
use crate::app::SENSITIVITY_STEP;
use crate::history::InteractionKind;
use crate::protocol::{TabId, UserCommand};

/// Lines moved by PageUp/PageDown.
const PAGE_SIZE: usize = 10;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to the
/// app orchestrator. Returns `None` when the key press was handled locally.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // Windows emits both Press and Release events for each keypress.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    // Ctrl+C always quits immediately regardless of mode
    if key_event.modifiers.contains(KeyModifiers::CONTROL)
        && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    match view_state.input_mode {
        InputMode::Normal => handle_normal(key_event, view_state),
        mode => handle_editing(key_event, mode, view_state),
    }
}

fn handle_normal(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('1') => {
            view_state.active_tab = TabId::Tarot;
            None
        }
        KeyCode::Char('2') => {
            view_state.active_tab = TabId::Stock;
            None
        }
        KeyCode::Char('3') => {
            view_state.active_tab = TabId::History;
            None
        }
        KeyCode::Tab => {
            view_state.active_tab = view_state.active_tab.next();
            None
        }

        // Session
        KeyCode::Char('l') => {
            view_state.nickname_input.clear();
            view_state.input_mode = InputMode::EditingNickname;
            None
        }
        KeyCode::Char('L') => Some(UserCommand::Logout),

        // Fields
        KeyCode::Char('i') => {
            if view_state.active_tab == TabId::History {
                view_state.active_tab = TabId::Tarot;
            }
            view_state.input_mode = InputMode::EditingQuery;
            None
        }
        KeyCode::Char('s') => {
            view_state.active_tab = TabId::Stock;
            view_state.input_mode = InputMode::EditingSymbol;
            None
        }
        KeyCode::Enter => submit(view_state),

        // Sensitivity
        KeyCode::Char('+') | KeyCode::Char('=') => Some(UserCommand::SetSensitivity(
            view_state.sensitivity + SENSITIVITY_STEP,
        )),
        KeyCode::Char('-') => Some(UserCommand::SetSensitivity(
            view_state.sensitivity - SENSITIVITY_STEP,
        )),

        KeyCode::Char('r') => Some(UserCommand::RefreshHistory),

        // Scrolling (main panel)
        KeyCode::Up | KeyCode::Char('k') => {
            scroll_up(view_state, 1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            scroll_down(view_state, 1);
            None
        }
        KeyCode::PageUp => {
            scroll_up(view_state, PAGE_SIZE);
            None
        }
        KeyCode::PageDown => {
            scroll_down(view_state, PAGE_SIZE);
            None
        }

        // Quit: enter confirmation mode instead of quitting immediately
        KeyCode::Char('q') => {
            view_state.confirm_quit = true;
            None
        }

        _ => None,
    }
}

/// Handle key events while a text field has focus.
///
/// Printable characters edit the field, Enter submits, Esc leaves the field
/// with its text intact, Tab moves between the stock fields.
fn handle_editing(
    key_event: KeyEvent,
    mode: InputMode,
    view_state: &mut ViewState,
) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Esc => {
            view_state.input_mode = InputMode::Normal;
            None
        }
        KeyCode::Enter => {
            view_state.input_mode = InputMode::Normal;
            if mode == InputMode::EditingNickname {
                let nickname = std::mem::take(&mut view_state.nickname_input);
                return Some(UserCommand::Login(nickname));
            }
            submit(view_state)
        }
        KeyCode::Tab if view_state.active_tab == TabId::Stock => {
            view_state.input_mode = match mode {
                InputMode::EditingSymbol => InputMode::EditingQuery,
                InputMode::EditingQuery => InputMode::EditingSymbol,
                other => other,
            };
            None
        }
        KeyCode::Backspace => {
            if let Some(field) = field_mut(mode, view_state) {
                field.pop();
            }
            None
        }
        KeyCode::Char(c) => {
            if let Some(field) = field_mut(mode, view_state) {
                field.push(c);
            }
            None
        }
        _ => None,
    }
}

/// Handle key events while in quit confirmation mode.
///
/// `y` or `q` confirms, `n` or `Esc` cancels, all other keys are blocked.
fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Char('Q') => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

/// Build the reading command for the active tab.
fn submit(view_state: &ViewState) -> Option<UserCommand> {
    match view_state.active_tab {
        TabId::Tarot => Some(UserCommand::DrawTarot {
            query: view_state.tarot_query.trim().to_string(),
        }),
        TabId::Stock if !view_state.stock_symbol.trim().is_empty() => {
            Some(UserCommand::AnalyzeStock {
                symbol: view_state.stock_symbol.trim().to_string(),
                query: view_state.stock_query.trim().to_string(),
            })
        }
        _ => None,
    }
}

/// The text buffer edited in `mode` on the active tab.
fn field_mut(mode: InputMode, view_state: &mut ViewState) -> Option<&mut String> {
    match (mode, view_state.active_tab) {
        (InputMode::EditingNickname, _) => Some(&mut view_state.nickname_input),
        (InputMode::EditingSymbol, _) => Some(&mut view_state.stock_symbol),
        (InputMode::EditingQuery, TabId::Stock) => Some(&mut view_state.stock_query),
        (InputMode::EditingQuery, _) => Some(&mut view_state.tarot_query),
        (InputMode::Normal, _) => None,
    }
}

/// Scroll key of the reading panel for an interaction kind.
pub fn reading_scroll_key(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Tarot => "tarot_reading",
        InteractionKind::Stock => "stock_reading",
    }
}

/// Get the widget key for scroll state based on the active tab.
fn active_widget_key(view_state: &ViewState) -> &'static str {
    match view_state.active_tab {
        TabId::Tarot => reading_scroll_key(InteractionKind::Tarot),
        TabId::Stock => reading_scroll_key(InteractionKind::Stock),
        TabId::History => "history",
    }
}

fn scroll_up(view_state: &mut ViewState, lines: usize) {
    let key = active_widget_key(view_state);
    let offset = view_state.scroll_offset.entry(key.to_string()).or_insert(0);
    *offset = offset.saturating_sub(lines);
}

fn scroll_down(view_state: &mut ViewState, lines: usize) {
    let key = active_widget_key(view_state);
    let offset = view_state.scroll_offset.entry(key.to_string()).or_insert(0);
    *offset = offset.saturating_add(lines);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
