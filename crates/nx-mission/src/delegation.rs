// delegation.rs - The minimal payload a Commander hands to a Sub-agent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Data plus a proposed filename. No code, no command, no free-text reasoning.
///
/// The payload is a JSON object by type, so a Sub-agent can never be handed
/// a bare string to interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    filename: String,
    payload: Map<String, Value>,
}

impl Delegation {
    pub fn new(filename: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            filename: filename.into(),
            payload,
        }
    }

    /// Untrusted: the Sub-agent re-checks it.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub(crate) fn into_payload(self) -> Map<String, Value> {
        self.payload
    }
}
