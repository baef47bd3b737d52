// CSV "sheet" history backend.
//
// Every operation reads the whole sheet; an append rewrites the whole sheet
// through a private temp file in the same directory and an atomic rename.
// There is no locking, so two writers racing each other lose one row (last
// write wins), but the published file is always one writer's complete copy.
//
// Rows are carried through an append exactly as read. Rows this app cannot
// parse are hidden from `load_all` but never dropped from the file.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::ByteRecord;
use tracing::{debug, warn};

use super::{HistoryRecord, HistoryStore};

const HEADER: [&str; 6] = ["nickname", "timestamp", "kind", "query", "cards", "summary"];

pub struct SheetHistory {
    path: PathBuf,
}

impl SheetHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SheetHistory { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every row in the file, header included, untouched.
    fn raw_rows(&self) -> Result<Vec<ByteRecord>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to open {}", self.path.display()))
            }
        };
        read_raw_rows(file).with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Publish `existing` plus `record` as the new sheet.
    fn rewrite(&self, existing: &[ByteRecord], record: &HistoryRecord) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        write_rows(tmp.as_file_mut(), existing, record)
            .with_context(|| format!("failed to write {}", tmp.path().display()))?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl HistoryStore for SheetHistory {
    fn load_all(&self) -> Result<Vec<HistoryRecord>> {
        match std::fs::File::open(&self.path) {
            Ok(file) => load_from_reader(file)
                .with_context(|| format!("failed to read {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to open {}", self.path.display()))
            }
        }
    }

    fn append(&self, record: &HistoryRecord) -> Result<()> {
        let rows = self.raw_rows()?;
        debug!("Rewriting sheet {} with {} rows", self.path.display(), rows.len() + 1);
        self.rewrite(&rows, record)
    }
}

// ---------------------------------------------------------------------------
// Reader/writer helpers (testable without files)
// ---------------------------------------------------------------------------

/// Typed rows for display. Surrounding whitespace is ignored; rows that
/// still do not fit `HistoryRecord` are skipped.
fn load_from_reader<R: Read>(rdr: R) -> Result<Vec<HistoryRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(rdr);
    let mut records = Vec::new();
    for result in reader.deserialize::<HistoryRecord>() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => warn!("skipping malformed history row: {}", e),
        }
    }
    Ok(records)
}

fn read_raw_rows<R: Read>(rdr: R) -> Result<Vec<ByteRecord>, csv::Error> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(rdr)
        .byte_records()
        .collect()
}

/// `existing` rows verbatim, then `record`. An empty sheet gets the header.
fn write_rows<W: Write>(
    wtr: W,
    existing: &[ByteRecord],
    record: &HistoryRecord,
) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(wtr);
    if existing.is_empty() {
        writer.write_record(HEADER)?;
    }
    for row in existing {
        writer.write_byte_record(row)?;
    }
    writer.serialize(record)?;
    writer.flush()?;
    Ok(())
}
