// SQLite history backend: one append-only table.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::warn;

use super::{HistoryRecord, HistoryStore, InteractionKind};

pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open (or create) the history database at `path`. Pass `":memory:"` for
    /// an ephemeral database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open history database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        // No uniqueness constraint: identical interactions are separate rows.
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS history (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                nickname  TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                kind      TEXT NOT NULL,
                query     TEXT NOT NULL,
                cards     TEXT NOT NULL,
                summary   TEXT NOT NULL
            );
            ",
        )
        .context("failed to create history schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    fn query_records(&self, sql: &str, filter: Option<&str>) -> Result<Vec<HistoryRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(sql)
            .context("failed to prepare history query")?;

        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        };
        let rows = match filter {
            Some(nickname) => stmt.query_map(params![nickname], map_row),
            None => stmt.query_map([], map_row),
        }
        .context("failed to query history")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map history rows")?;

        Ok(rows
            .into_iter()
            .filter_map(|(nickname, timestamp, kind, query, cards, summary)| {
                let Some(kind) = InteractionKind::parse(&kind) else {
                    warn!("Skipping history row with unknown kind {kind:?}");
                    return None;
                };
                Some(HistoryRecord {
                    nickname,
                    timestamp,
                    kind,
                    query,
                    cards,
                    summary,
                })
            })
            .collect())
    }
}

impl HistoryStore for SqliteHistory {
    fn load_all(&self) -> Result<Vec<HistoryRecord>> {
        self.query_records(
            "SELECT nickname, timestamp, kind, query, cards, summary
             FROM history ORDER BY id",
            None,
        )
    }

    fn append(&self, record: &HistoryRecord) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO history (nickname, timestamp, kind, query, cards, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.nickname,
                record.timestamp,
                record.kind.as_str(),
                record.query,
                record.cards,
                record.summary,
            ],
        )
        .context("failed to append history record")?;
        Ok(())
    }

    fn for_user(&self, nickname: &str) -> Result<Vec<HistoryRecord>> {
        self.query_records(
            "SELECT nickname, timestamp, kind, query, cards, summary
             FROM history WHERE nickname = ?1 ORDER BY id",
            Some(nickname),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::sample_record;

    fn test_db() -> SqliteHistory {
        SqliteHistory::open(":memory:").expect("in-memory db should open")
    }

    #[test]
    fn open_creates_table() {
        let db = test_db();
        let conn = db.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='history'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn append_then_load_in_insertion_order() {
        let db = test_db();
        db.append(&sample_record("ana", "first")).unwrap();
        db.append(&sample_record("bo", "second")).unwrap();
        db.append(&sample_record("ana", "third")).unwrap();

        let all = db.load_all().unwrap();
        let queries: Vec<_> = all.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(queries, vec!["first", "second", "third"]);
        assert_eq!(all[0], sample_record("ana", "first"));
    }

    #[test]
    fn duplicate_records_are_kept() {
        let db = test_db();
        let rec = sample_record("ana", "same");
        db.append(&rec).unwrap();
        db.append(&rec).unwrap();
        assert_eq!(db.load_all().unwrap().len(), 2);
    }

    #[test]
    fn for_user_uses_exact_match() {
        let db = test_db();
        db.append(&sample_record("ana", "1")).unwrap();
        db.append(&sample_record("Ana", "2")).unwrap();
        db.append(&sample_record("ana ", "3")).unwrap();
        db.append(&sample_record("ana", "4")).unwrap();

        let mine: Vec<_> = db
            .for_user("ana")
            .unwrap()
            .into_iter()
            .map(|r| r.query)
            .collect();
        assert_eq!(mine, vec!["1", "4"]);
    }

    #[test]
    fn recent_for_user_keeps_the_tail() {
        let db = test_db();
        for i in 0..5 {
            db.append(&sample_record("ana", &i.to_string())).unwrap();
        }
        let recent: Vec<_> = db
            .recent_for_user("ana", 2)
            .unwrap()
            .into_iter()
            .map(|r| r.query)
            .collect();
        assert_eq!(recent, vec!["3", "4"]);
        assert!(db.recent_for_user("nobody", 3).unwrap().is_empty());
    }

    #[test]
    fn stock_kind_is_stored_as_text() {
        let db = test_db();
        let mut rec = sample_record("ana", "AAPL: buy?");
        rec.kind = InteractionKind::Stock;
        db.append(&rec).unwrap();

        let stored: String = db
            .conn()
            .query_row("SELECT kind FROM history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "stock");
    }

    #[test]
    fn rows_with_unknown_kind_are_skipped() {
        let db = test_db();
        db.append(&sample_record("ana", "ok")).unwrap();
        db.conn()
            .execute(
                "INSERT INTO history (nickname, timestamp, kind, query, cards, summary)
                 VALUES ('ana', 't', 'palmistry', 'q', '[]', 's')",
                [],
            )
            .unwrap();
        assert_eq!(db.load_all().unwrap().len(), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let path = path.to_str().unwrap();
        {
            let db = SqliteHistory::open(path).unwrap();
            db.append(&sample_record("ana", "kept")).unwrap();
        }
        let db = SqliteHistory::open(path).unwrap();
        assert_eq!(db.load_all().unwrap()[0].query, "kept");
    }
}
