// record.rs - The artifact written on a successful mission.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// What lands on disk: the delegated payload plus where and when it was written.
///
/// Created once per executed mission and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub record_id: Uuid,
    pub written_at: DateTime<Utc>,
    pub resolved_path: PathBuf,
    /// SHA-256 of the payload's compact JSON form.
    pub payload_sha256: String,
    pub payload: Map<String, Value>,
}

impl DispatchRecord {
    pub(crate) fn new(
        resolved_path: PathBuf,
        payload: Map<String, Value>,
    ) -> Result<Self, serde_json::Error> {
        let compact = serde_json::to_string(&payload)?;
        Ok(Self {
            record_id: Uuid::new_v4(),
            written_at: Utc::now(),
            resolved_path,
            payload_sha256: nx_audit::hasher::hash_str(&compact),
            payload,
        })
    }

    /// Recompute the payload digest and compare.
    pub fn payload_matches_digest(&self) -> bool {
        serde_json::to_string(&self.payload)
            .map(|compact| nx_audit::hasher::hash_str(&compact) == self.payload_sha256)
            .unwrap_or(false)
    }
}
