// sink.rs - Where mission records go.

use std::sync::{Mutex, PoisonError};

use crate::error::AuditError;
use crate::record::MissionRecord;

/// Receives exactly one record per mission.
///
/// Takes `&self` so one sink can be shared by missions running on many
/// threads.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: MissionRecord) -> Result<(), AuditError>;
}

/// Keeps records in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<MissionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far, oldest first.
    pub fn records(&self) -> Vec<MissionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemorySink {
    fn record(&self, record: MissionRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}
