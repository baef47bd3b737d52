// Screen layout: panel arrangement and sizing.
//
// +--------------------------------------------------+
// | Status Bar (1 row)                                |
// +------------------+-------------------------------+
// | Login (4 rows)   | Main Panel                    |
// | Sensitivity (3)  | (Tarot / Stock / History tab) |
// | Keys (fill)      |                               |
// +------------------+-------------------------------+
// | Help Bar (1 row)                                  |
// +--------------------------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Width of the left sidebar in columns.
pub const SIDEBAR_WIDTH: u16 = 28;

/// Resolved screen areas for each zone.
#[derive(Debug, Clone)]
pub struct AppLayout {
    /// Top row: session, tabs, latest notice.
    pub status_bar: Rect,
    /// Sidebar top: nickname / login field.
    pub login: Rect,
    /// Sidebar middle: sensitivity slider.
    pub sensitivity: Rect,
    /// Sidebar bottom: key reference.
    pub sidebar_info: Rect,
    /// Tab-switched content area.
    pub main_panel: Rect,
    /// Bottom row: keyboard shortcut hints.
    pub help_bar: Rect,
}

/// Build the layout from the available terminal area.
pub fn build_layout(area: Rect) -> AppLayout {
    // Vertical: status(1) | middle(fill) | help(1)
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(area);

    let status_bar = vertical[0];
    let middle = vertical[1];
    let help_bar = vertical[2];

    // Horizontal: sidebar (fixed) | main panel (fill)
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(middle);

    let sidebar = horizontal[0];
    let main_panel = horizontal[1];

    let sidebar_sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(sidebar);

    AppLayout {
        status_bar,
        login: sidebar_sections[0],
        sensitivity: sidebar_sections[1],
        sidebar_info: sidebar_sections[2],
        main_panel,
        help_bar,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
