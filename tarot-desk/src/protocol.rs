// Message types passed between the app orchestrator, background tasks, and
// the TUI.

use crate::history::{HistoryRecord, InteractionKind};
use crate::market::{Indicators, MarketSnapshot};
use crate::tarot::art::ArtSource;
use crate::tarot::deck::Card;

// ---------------------------------------------------------------------------
// Shared enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabId {
    #[default]
    Tarot,
    Stock,
    History,
}

impl TabId {
    pub const ALL: [TabId; 3] = [TabId::Tarot, TabId::Stock, TabId::History];

    pub fn title(self) -> &'static str {
        match self {
            TabId::Tarot => "Tarot",
            TabId::Stock => "Stock",
            TabId::History => "History",
        }
    }

    pub fn next(self) -> TabId {
        match self {
            TabId::Tarot => TabId::Stock,
            TabId::Stock => TabId::History,
            TabId::History => TabId::Tarot,
        }
    }

    /// The reading tab for an interaction kind.
    pub fn for_kind(kind: InteractionKind) -> TabId {
        match kind {
            InteractionKind::Tarot => TabId::Tarot,
            InteractionKind::Stock => TabId::Stock,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmStatus {
    #[default]
    Idle,
    /// Waiting on market data before the model call starts.
    Fetching,
    Streaming,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// One-line message for the status bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// A drawn card with its resolved art.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnCard {
    pub card: Card,
    pub art: ArtSource,
}

// ---------------------------------------------------------------------------
// Background task -> app
// ---------------------------------------------------------------------------

/// Streaming events from the model client. `generation` identifies the task
/// that produced the event so stale ones can be dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    Token {
        text: String,
        generation: u64,
    },
    Complete {
        full_text: String,
        input_tokens: u32,
        output_tokens: u32,
        stop_reason: Option<String>,
        generation: u64,
    },
    Error {
        message: String,
        generation: u64,
    },
}

impl LlmEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LlmEvent::Token { generation, .. }
            | LlmEvent::Complete { generation, .. }
            | LlmEvent::Error { generation, .. } => *generation,
        }
    }
}

/// Result of a market fetch task.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    Fetched {
        symbol: String,
        snapshot: Option<MarketSnapshot>,
        generation: u64,
    },
    Failed {
        symbol: String,
        message: String,
        generation: u64,
    },
}

impl MarketEvent {
    pub fn generation(&self) -> u64 {
        match self {
            MarketEvent::Fetched { generation, .. } | MarketEvent::Failed { generation, .. } => {
                *generation
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TUI -> app
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Login(String),
    Logout,
    DrawTarot { query: String },
    AnalyzeStock { symbol: String, query: String },
    SetSensitivity(f32),
    RefreshHistory,
    Quit,
}

// ---------------------------------------------------------------------------
// App -> TUI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    SessionChanged {
        nickname: Option<String>,
    },
    SensitivityChanged(f32),
    /// A new interaction started: clears the reading on that tab.
    CardsDrawn {
        kind: InteractionKind,
        cards: Vec<DrawnCard>,
    },
    MarketData {
        symbol: String,
        snapshot: Option<Box<MarketSnapshot>>,
        indicators: Option<Indicators>,
    },
    ReadingStatus(LlmStatus),
    ReadingToken(String),
    /// Final reading text (the degraded text when the call failed).
    ReadingComplete {
        text: String,
        summary: Option<String>,
    },
    History(Vec<HistoryRecord>),
    Notice(Notice),
}
