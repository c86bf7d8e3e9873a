//! Change journal
//!
//! Optional append-only export of every change event, one line each:
//!
//! ```text
//! [2024-05-01 12:00:00] Node node1 Modified Ready: true -> false
//! ```
//!
//! The journal is never read back; the in-memory [`ChangeLog`] is what the
//! UI shows.

use nodepulse_core::{ChangeEvent, ChangeLog, ChangeSink, format_journal_timestamp};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Format one journal line, without the trailing newline
pub fn format_entry(event: &ChangeEvent) -> String {
    let mut line = format!(
        "[{}] {} {} {}",
        format_journal_timestamp(event.timestamp),
        event.resource_kind,
        event.resource_key,
        event.change_type
    );
    if let Some(detail) = event.describe() {
        line.push(' ');
        line.push_str(&detail);
    }
    line
}

/// Append-only change file, opened once and flushed after every batch
#[derive(Debug)]
pub struct ChangeJournal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ChangeJournal {
    /// Open `path` for appending, creating its parent directory if needed
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append events in order; write errors are logged and swallowed
    pub fn append(&mut self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.write_entries(events) {
            tracing::warn!(
                "Failed to write change journal {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn write_entries(&mut self, events: &[ChangeEvent]) -> io::Result<()> {
        for event in events {
            writeln!(self.writer, "{}", format_entry(event))?;
        }
        self.writer.flush()
    }
}

/// Change sink feeding the UI's change log and, optionally, the journal
#[derive(Debug)]
pub struct ChangeRecorder {
    log: Arc<Mutex<ChangeLog>>,
    journal: Option<ChangeJournal>,
}

impl ChangeRecorder {
    pub fn new(log: Arc<Mutex<ChangeLog>>, journal: Option<ChangeJournal>) -> Self {
        Self { log, journal }
    }
}

impl ChangeSink for ChangeRecorder {
    fn append_changes(&mut self, events: &[ChangeEvent]) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append_changes(events);
        if let Some(journal) = &mut self.journal {
            journal.append(events);
        }
    }
}
