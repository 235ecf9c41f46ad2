//! Invariant repair — the last line of defense.
//!
//! Both interpretation paths produce a [`RawAssessment`] that may be
//! internally inconsistent; the model's output format is not contractually
//! guaranteed. This single function forces every assessment into a
//! schema-valid shape before anything downstream sees it.

use super::parser::RawAssessment;
use super::types::{ItemCategory, Severity};

/// Substituted when disease is flagged but no usable name was extracted.
pub const UNIDENTIFIED_DISEASE: &str = "Unidentified Disease";

/// Invariant-satisfying assessment fields, ready for outcome assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedFields {
    pub disease_detected: bool,
    pub disease_name: Option<String>,
    pub confidence: f32,
    pub symptoms: Vec<String>,
    pub recommendations: Vec<String>,
    pub severity: Severity,
}

/// Force a raw assessment into consistency with the domain invariants.
///
/// - Unrelated images never carry disease findings, whatever the text said.
/// - A flagged disease always has a non-empty name (sentinel if needed).
/// - A healthy record has no name and `Severity::None`; a diseased record
///   never has `Severity::None` (ambiguity resolves to Medium).
/// - Confidence lands in [0, 1].
pub fn repair(raw: RawAssessment, category: ItemCategory) -> RepairedFields {
    let detected = match category {
        ItemCategory::Unrelated => false,
        _ => raw.disease_detected.unwrap_or(false),
    };

    let name = raw
        .disease_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let (disease_name, severity) = if detected {
        (
            Some(name.unwrap_or_else(|| UNIDENTIFIED_DISEASE.to_string())),
            match raw.severity {
                Some(Severity::None) | None => Severity::Medium,
                Some(s) => s,
            },
        )
    } else {
        (None, Severity::None)
    };

    RepairedFields {
        disease_detected: detected,
        disease_name,
        confidence: normalize_confidence(raw.confidence.unwrap_or(0.5)),
        symptoms: clean_list(raw.symptoms),
        recommendations: clean_list(raw.recommendations),
        severity,
    }
}

/// Clamp confidence into [0, 1]. Values in (1, 100] are treated as percent
/// figures and rescaled — saturating them to 1.0 would report certainty the
/// model never claimed. Non-finite input falls back to 0.5.
pub fn normalize_confidence(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.5;
    }
    let value = if value > 1.0 && value <= 100.0 {
        value / 100.0
    } else {
        value
    };
    value.clamp(0.0, 1.0)
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
