// log.rs - Append-only JSONL audit log with a SHA-256 hash chain.
//
// One mission record per line. Each record's `previous_hash` is the hash of
// the raw line before it, so inserting, deleting or editing a line breaks the
// chain and `verify_chain` reports where.
//
// An append is all or nothing. The serialized line and its newline go to the
// file in a single `write_all` with no buffer in between, so a failed append
// cannot leave bytes behind to be flushed later with someone else's record.
// If the write fails part way, the file is cut back to the length it had
// before, and the chain head is only advanced once the line is durable in the
// file. A record the caller was told failed therefore never shows up in the
// log, and the next record links to the last one that actually landed.
//
// Appends from concurrent missions are serialised by a mutex around the file
// handle and the chain head.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::AuditError;
use crate::hasher;
use crate::record::MissionRecord;
use crate::sink::AuditSink;

/// The file operations an append needs: write, and undo a partial write.
trait LogFile: Write {
    fn len(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

struct ChainState<F> {
    file: F,
    last_hash: Option<String>,
}

impl<F: LogFile> ChainState<F> {
    /// Link `record` to the chain head and write it as one line.
    fn append(&mut self, record: &mut MissionRecord) -> Result<(), AuditError> {
        record.previous_hash = self.last_hash.clone();
        let line = serde_json::to_string(record)?;
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let before = self.file.len()?;
        if let Err(e) = self.file.write_all(&bytes).and_then(|()| self.file.flush()) {
            if let Err(undo) = self.file.truncate(before) {
                tracing::error!(error = %undo, "could not roll back partial audit line");
            }
            return Err(e.into());
        }

        self.last_hash = Some(hasher::hash_str(&line));
        Ok(())
    }
}

/// An append-only audit log backed by a JSONL file.
pub struct AuditLog {
    path: PathBuf,
    state: Mutex<ChainState<File>>,
}

impl AuditLog {
    /// Open (or create) a log, recovering the chain head from existing lines.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        let last_hash = if path.exists() {
            Self::read_last_hash(&path)?
        } else {
            None
        };

        // Append mode: existing lines are never overwritten.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            state: Mutex::new(ChainState { file, last_hash }),
        })
    }

    /// Link `record` to the chain and append it. On error nothing is left in
    /// the file and the chain head is unchanged.
    pub fn append(&self, record: &mut MissionRecord) -> Result<(), AuditError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(record)
    }

    /// All records in a log file, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<MissionRecord>, AuditError> {
        let mut records = Vec::new();
        for line in Self::lines(path.as_ref())? {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    /// Verify the hash chain; returns the number of records checked.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let mut previous_hash: Option<String> = None;
        let mut count = 0;

        for (index, line) in Self::lines(path.as_ref())?.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: MissionRecord = serde_json::from_str(&line)?;
            if record.previous_hash != previous_hash {
                return Err(AuditError::IntegrityViolation {
                    line: index + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: record.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            // Hash the raw line: re-serialising could reorder fields.
            previous_hash = Some(hasher::hash_str(&line));
            count += 1;
        }
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lines(path: &Path) -> Result<std::io::Lines<BufReader<File>>, AuditError> {
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(BufReader::new(file).lines())
    }

    fn read_last_hash(path: &Path) -> Result<Option<String>, AuditError> {
        let mut last_line = None;
        for line in Self::lines(path)? {
            let line = line?;
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }
        Ok(last_line.map(|line| hasher::hash_str(&line)))
    }
}

impl AuditSink for AuditLog {
    fn record(&self, mut record: MissionRecord) -> Result<(), AuditError> {
        self.append(&mut record)?;
        tracing::debug!(
            mission_id = %record.mission_id,
            outcome = %record.outcome,
            path = %self.path.display(),
            "mission record appended"
        );
        Ok(())
    }
}
