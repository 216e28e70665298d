// intent.rs - Intent model and the candidate -> intent boundary.
//
// A CandidateIntent is what the upstream reasoning collaborator hands us:
// every field optional, every field untrusted. `parse_candidate` is the only
// way to obtain an Intent, and an Intent has no setters. A corrected intent
// is always a new value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IntentError;

/// The kinds of action a mission may propose.
///
/// Extending this enum is the only way to introduce a new action class.
/// Strings that name no known class parse to [`ActionType::Unknown`], which a
/// policy can never allowlist, so surprise actions are denied by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    /// Write one dispatch log (a JSON record) under the dispatch root.
    WriteDispatchLog,
    /// Read a situation report.
    ReadResource,
    /// Send an outbound notification (SMS, webhook).
    SendNotification,
    /// Anything else.
    Unknown,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::WriteDispatchLog,
        ActionType::ReadResource,
        ActionType::SendNotification,
        ActionType::Unknown,
    ];

    /// The wire name, e.g. `WRITE_DISPATCH_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::WriteDispatchLog => "WRITE_DISPATCH_LOG",
            ActionType::ReadResource => "READ_RESOURCE",
            ActionType::SendNotification => "SEND_NOTIFICATION",
            ActionType::Unknown => "UNKNOWN",
        }
    }

    /// Parse a wire name. Only the exact upper-case name matches; anything
    /// else, including `write_dispatch_log` or a padded name, maps to
    /// `Unknown` and is denied.
    pub fn parse(raw: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == raw)
            .unwrap_or(ActionType::Unknown)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ActionType {
    fn from(raw: String) -> Self {
        ActionType::parse(&raw)
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        action.as_str().to_string()
    }
}

/// Accepted top-level emergency categories for logistics dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisasterCategory {
    Flood,
    Earthquake,
    Wildfire,
    Cyclone,
    Infrastructure,
    Evacuation,
    SearchRescue,
    Logistics,
    #[default]
    Unknown,
}

impl DisasterCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisasterCategory::Flood => "flood",
            DisasterCategory::Earthquake => "earthquake",
            DisasterCategory::Wildfire => "wildfire",
            DisasterCategory::Cyclone => "cyclone",
            DisasterCategory::Infrastructure => "infrastructure",
            DisasterCategory::Evacuation => "evacuation",
            DisasterCategory::SearchRescue => "search_rescue",
            DisasterCategory::Logistics => "logistics",
            DisasterCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DisasterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisasterCategory {
    type Err = IntentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let category = match normalized.as_str() {
            "flood" => DisasterCategory::Flood,
            "earthquake" => DisasterCategory::Earthquake,
            "wildfire" => DisasterCategory::Wildfire,
            "cyclone" => DisasterCategory::Cyclone,
            "infrastructure" => DisasterCategory::Infrastructure,
            "evacuation" => DisasterCategory::Evacuation,
            "search_rescue" => DisasterCategory::SearchRescue,
            "logistics" => DisasterCategory::Logistics,
            "unknown" => DisasterCategory::Unknown,
            _ => {
                return Err(IntentError::UnknownCategory {
                    value: raw.to_string(),
                })
            }
        };
        Ok(category)
    }
}

/// The raw value consumed from the reasoning collaborator.
///
/// Every field is optional because the upstream step is generative and may
/// omit or mangle any of them. Field names are camelCase on the wire, with
/// snake_case accepted as an alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateIntent {
    #[serde(default, alias = "action_type")]
    pub action_type: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default, alias = "target_path")]
    pub target_path: Option<String>,

    #[serde(default)]
    pub payload: Option<Value>,

    #[serde(default, alias = "justification_text")]
    pub justification_text: Option<String>,
}

impl CandidateIntent {
    /// Start a candidate with the two fields every mission needs.
    pub fn new(action_type: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self {
            action_type: Some(action_type.into()),
            target_path: Some(target_path.into()),
            payload: Some(Value::Object(Map::new())),
            justification_text: Some(String::new()),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_justification(mut self, text: impl Into<String>) -> Self {
        self.justification_text = Some(text.into());
        self
    }
}

/// A validated, immutable proposed action.
///
/// Fields are private and there are no setters: the only constructor is
/// [`parse_candidate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    action_type: ActionType,
    /// The action string exactly as the candidate named it.
    requested_action: String,
    category: DisasterCategory,
    target_path: String,
    payload: Map<String, Value>,
    justification_text: String,
}

impl Intent {
    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    /// The raw action name from the candidate. Differs from
    /// `action_type().as_str()` only when the name was not recognised.
    pub fn requested_action(&self) -> &str {
        &self.requested_action
    }

    pub fn category(&self) -> DisasterCategory {
        self.category
    }

    /// The untrusted relative path the mission wants to write to.
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn justification_text(&self) -> &str {
        &self.justification_text
    }
}

/// Outcome of the boundary parse: a valid intent or the reason it was refused.
pub type ParseResult = Result<Intent, IntentError>;

/// Convert an untrusted candidate into an [`Intent`].
///
/// Structural problems (missing fields, unknown category, non-object payload)
/// are rejected here, before any policy phase runs. Policy questions, such as
/// whether the action type is allowed or the path is in scope, are left to
/// the Shield.
pub fn parse_candidate(candidate: CandidateIntent) -> ParseResult {
    let action_raw = candidate
        .action_type
        .ok_or(IntentError::MissingField { field: "actionType" })?;
    if action_raw.trim().is_empty() {
        return Err(IntentError::EmptyField { field: "actionType" });
    }

    let category = match candidate.category.as_deref().map(str::trim) {
        None | Some("") => DisasterCategory::Unknown,
        Some(raw) => raw.parse()?,
    };

    let target_path = candidate
        .target_path
        .ok_or(IntentError::MissingField { field: "targetPath" })?;
    if target_path.trim().is_empty() {
        return Err(IntentError::EmptyField { field: "targetPath" });
    }

    let payload = match candidate.payload {
        None | Some(Value::Null) => return Err(IntentError::MissingField { field: "payload" }),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(IntentError::PayloadNotObject {
                kind: value_kind(&other),
            })
        }
    };

    let justification_text = candidate.justification_text.ok_or(IntentError::MissingField {
        field: "justificationText",
    })?;

    Ok(Intent {
        action_type: ActionType::parse(&action_raw),
        requested_action: action_raw,
        category,
        target_path,
        payload,
        justification_text,
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
