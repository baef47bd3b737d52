// Persisted interaction history: record type, store trait, and backend
// selection.

pub mod sheet;
pub mod sqlite;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

pub use sheet::SheetHistory;
pub use sqlite::SqliteHistory;

/// Client-clock timestamp format used for every stored record.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// The two interaction categories. Stored as `"tarot"` / `"stock"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Tarot,
    Stock,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::Tarot => "tarot",
            InteractionKind::Stock => "stock",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tarot" => Some(InteractionKind::Tarot),
            "stock" => Some(InteractionKind::Stock),
            _ => None,
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub nickname: String,
    pub timestamp: String,
    pub kind: InteractionKind,
    /// The user's question, or `SYMBOL: question` for stock analyses.
    pub query: String,
    /// Drawn card names as a JSON array string.
    pub cards: String,
    pub summary: String,
}

impl HistoryRecord {
    /// Build a record stamped with the current local time.
    pub fn now(
        nickname: &str,
        kind: InteractionKind,
        query: &str,
        cards: String,
        summary: String,
    ) -> Self {
        HistoryRecord {
            nickname: nickname.to_string(),
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            kind,
            query: query.to_string(),
            cards,
            summary,
        }
    }

    /// Card names decoded from the stored list string. Falls back to a
    /// comma split for hand-edited rows.
    pub fn card_names(&self) -> Vec<String> {
        serde_json::from_str::<Vec<String>>(&self.cards).unwrap_or_else(|_| {
            self.cards
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// An append-only table of history records.
pub trait HistoryStore: Send + Sync {
    /// Every record, in insertion order.
    fn load_all(&self) -> Result<Vec<HistoryRecord>>;

    fn append(&self, record: &HistoryRecord) -> Result<()>;

    /// Records whose nickname equals `nickname` exactly, in insertion order.
    fn for_user(&self, nickname: &str) -> Result<Vec<HistoryRecord>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.nickname == nickname)
            .collect())
    }

    /// The last `n` records for `nickname`, oldest first.
    fn recent_for_user(&self, nickname: &str, n: usize) -> Result<Vec<HistoryRecord>> {
        let mut records = self.for_user(nickname)?;
        let skip = records.len().saturating_sub(n);
        records.drain(..skip);
        Ok(records)
    }
}

/// Open the backend named in the storage config, creating parent
/// directories as needed.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn HistoryStore>> {
    let path = config.resolved_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    info!("Opening {:?} history store at {}", config.backend, path.display());

    let store: Arc<dyn HistoryStore> = match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteHistory::open(&path.to_string_lossy())?),
        StorageBackend::Sheet => Arc::new(SheetHistory::new(path)),
    };
    Ok(store)
}

#[cfg(test)]
pub(crate) fn sample_record(nickname: &str, query: &str) -> HistoryRecord {
    HistoryRecord {
        nickname: nickname.to_string(),
        timestamp: "2026-01-02 03:04:05".to_string(),
        kind: InteractionKind::Tarot,
        query: query.to_string(),
        cards: r#"["The Fool","Ace of Cups","Death"]"#.to_string(),
        summary: "New beginnings.".to_string(),
    }
}
