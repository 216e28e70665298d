// extract.rs - Deterministic candidate extraction from a report.
//
// Builds a CandidateIntent from sanitized free text with token lookups only.
// There is no model call here, so nothing in this path can be talked into a
// different answer.

use std::collections::BTreeSet;

use serde_json::json;

use crate::intent::{ActionType, CandidateIntent, DisasterCategory};

/// Schema version stamped into extracted dispatch payloads.
pub const DISPATCH_SCHEMA_VERSION: &str = "2.0.0";

const MEDICAL_SIGNALS: &[&str] = &[
    "diagnosis", "treatment", "prescription", "medication", "medical", "triage", "wound",
    "burn", "fracture", "surgery", "drug", "dosage", "patient", "symptom", "therapy",
    "infection", "antibiotic", "clinical", "injury", "injuries", "casualties", "treat",
    "prescribe", "diagnose", "rehabilitate", "anesthesia", "suture", "laceration", "sterile",
];

const LOGISTICS_SIGNALS: &[(&str, DisasterCategory)] = &[
    ("flood", DisasterCategory::Flood),
    ("flooding", DisasterCategory::Flood),
    ("earthquake", DisasterCategory::Earthquake),
    ("seismic", DisasterCategory::Earthquake),
    ("wildfire", DisasterCategory::Wildfire),
    ("fire", DisasterCategory::Wildfire),
    ("cyclone", DisasterCategory::Cyclone),
    ("hurricane", DisasterCategory::Cyclone),
    ("typhoon", DisasterCategory::Cyclone),
    ("evacuation", DisasterCategory::Evacuation),
    ("evacuate", DisasterCategory::Evacuation),
    ("rescue", DisasterCategory::SearchRescue),
    ("search", DisasterCategory::SearchRescue),
    ("logistics", DisasterCategory::Logistics),
    ("dispatch", DisasterCategory::Logistics),
    ("infrastructure", DisasterCategory::Infrastructure),
    ("bridge", DisasterCategory::Infrastructure),
    ("road", DisasterCategory::Infrastructure),
];

/// Split text into lower-case alphabetic words, in order of appearance.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
}

/// The set of lower-case `[a-z]+` tokens in `text`.
///
/// This is the tokenisation the Shield's keyword clusters are matched
/// against, so "Prescription," and "prescription" are the same token while
/// "prescriptions" is not.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    words(text).collect()
}

fn category_signal(token: &str) -> Option<DisasterCategory> {
    LOGISTICS_SIGNALS
        .iter()
        .find(|(signal, _)| *signal == token)
        .map(|(_, category)| *category)
}

/// The first logistics signal in reading order decides the category.
pub fn detect_category(text: &str) -> DisasterCategory {
    words(text)
        .find_map(|w| category_signal(&w))
        .unwrap_or(DisasterCategory::Unknown)
}

/// Medical and logistics signal words present in `text`, sorted.
pub fn signal_keywords(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| MEDICAL_SIGNALS.contains(&t.as_str()) || category_signal(t).is_some())
        .collect()
}

/// Build a `WRITE_DISPATCH_LOG` candidate from a sanitized report.
///
/// The report itself becomes the justification text, so the Shield scans
/// exactly what the human wrote.
pub fn extract_candidate(report: &str, target_path: &str) -> CandidateIntent {
    let category = detect_category(report);
    let keywords = signal_keywords(report);
    tracing::debug!(
        category = %category,
        keywords = ?keywords,
        "extracted candidate from report"
    );

    let payload = json!({
        "schema_version": DISPATCH_SCHEMA_VERSION,
        "disaster_category": category.as_str(),
        "mission_briefing": report,
        "keywords": keywords,
    });

    CandidateIntent::new(ActionType::WriteDispatchLog.as_str(), target_path)
        .with_category(category.as_str())
        .with_payload(payload)
        .with_justification(report)
}
