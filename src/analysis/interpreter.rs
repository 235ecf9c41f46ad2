//! Two-path response interpretation.
//!
//! The structured path is tried first; its failure is an ordinary value, not
//! an exception, and routes to the heuristic path. Repair runs on top of
//! either path's output, so `interpret` cannot fail and cannot emit an
//! inconsistent assessment — whatever text arrives.

use serde::Serialize;

use super::heuristic;
use super::parser;
use super::repair::{repair, RepairedFields};
use super::types::{ItemCategory, Severity};

/// Which path produced the assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Structured,
    Heuristic,
}

/// Invariant-satisfying interpretation of one model response.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub source: AssessmentSource,
    pub disease_detected: bool,
    pub disease_name: Option<String>,
    pub confidence: f32,
    pub symptoms: Vec<String>,
    pub recommendations: Vec<String>,
    pub severity: Severity,
}

/// Interpret model text for the given category. Never fails.
pub fn interpret(text: &str, category: ItemCategory) -> Interpretation {
    let (raw, source) = match parser::parse_structured(text) {
        Ok(raw) => (raw, AssessmentSource::Structured),
        Err(err) => {
            tracing::debug!(%err, "structured decode failed; using heuristic path");
            (heuristic::assess(text), AssessmentSource::Heuristic)
        }
    };

    let RepairedFields {
        disease_detected,
        disease_name,
        confidence,
        symptoms,
        recommendations,
        severity,
    } = repair(raw, category);

    Interpretation {
        source,
        disease_detected,
        disease_name,
        confidence,
        symptoms,
        recommendations,
        severity,
    }
}
