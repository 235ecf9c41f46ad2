//! Structured interpretation path.
//!
//! Locates a JSON object in the model's text — fenced ```json block first,
//! then a balanced-brace scan of the raw text — and decodes it leniently.
//! Failure is an ordinary [`ParseError`] value the interpreter inspects to
//! decide on the heuristic fallback; it is never used as control flow inside
//! this module.

use serde::Deserialize;
use thiserror::Error;

use super::types::Severity;

/// Why the structured path produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no JSON object found in model text")]
    NoJson,
    #[error("JSON decoding failed: {0}")]
    Decode(String),
}

/// Assessment fields as the model reported them, before invariant repair.
/// Both interpretation paths produce this shape; one repair function
/// consumes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAssessment {
    pub disease_detected: Option<bool>,
    pub disease_name: Option<String>,
    pub confidence: Option<f32>,
    pub symptoms: Vec<String>,
    pub recommendations: Vec<String>,
    pub severity: Option<Severity>,
}

/// Wire shape, tolerant of the model's spelling habits.
#[derive(Deserialize, Default)]
#[serde(default)]
struct WireAssessment {
    #[serde(alias = "diseaseDetected", alias = "has_disease")]
    disease_detected: Option<bool>,
    #[serde(alias = "diseaseName", alias = "disease")]
    disease_name: Option<serde_json::Value>,
    confidence: Option<serde_json::Value>,
    symptoms: Option<Vec<serde_json::Value>>,
    recommendations: Option<Vec<serde_json::Value>>,
    severity: Option<String>,
}

/// Decode the model text's JSON payload into a [`RawAssessment`].
pub fn parse_structured(text: &str) -> Result<RawAssessment, ParseError> {
    let json = extract_json_object(text).ok_or(ParseError::NoJson)?;
    let wire: WireAssessment =
        serde_json::from_str(json).map_err(|e| ParseError::Decode(e.to_string()))?;

    Ok(RawAssessment {
        disease_detected: wire.disease_detected,
        disease_name: wire.disease_name.and_then(coerce_string),
        confidence: wire.confidence.as_ref().and_then(coerce_number),
        symptoms: collect_strings(wire.symptoms),
        recommendations: collect_strings(wire.recommendations),
        severity: wire.severity.as_deref().and_then(parse_severity_label),
    })
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireVariety {
    variety: Option<String>,
    confidence: Option<serde_json::Value>,
    characteristics: Option<Vec<serde_json::Value>>,
    description: Option<String>,
}

/// Best-effort decode of the variety sub-response. `None` for anything that
/// does not carry a usable variety label — absence is not an error.
pub fn parse_variety_response(text: &str) -> Option<super::types::VarietyAssessment> {
    let json = extract_json_object(text)?;
    let wire: WireVariety = serde_json::from_str(json).ok()?;
    let label = wire.variety?;
    if label.trim().is_empty() {
        return None;
    }

    Some(super::types::VarietyAssessment {
        variety: super::types::MangoVariety::from_label(&label),
        confidence: super::repair::normalize_confidence(
            wire.confidence.as_ref().and_then(coerce_number).unwrap_or(0.5),
        ),
        characteristics: collect_strings(wire.characteristics),
        description: wire.description.unwrap_or_default().trim().to_string(),
    })
}

/// Find a JSON object in free-form model text.
///
/// Fenced ```json blocks take precedence (the prompts ask for them); raw
/// text is then scanned for the first balanced top-level object, tracking
/// string literals and escapes so braces inside values don't truncate it.
pub fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(fence_start) = text.find("```json") {
        let body_start = fence_start + "```json".len();
        if let Some(fence_len) = text[body_start..].find("```") {
            let candidate = text[body_start..body_start + fence_len].trim();
            if !candidate.is_empty() {
                return Some(candidate);
            }
        }
    }
    scan_balanced_object(text)
}

fn scan_balanced_object(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..open + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// A string value that actually names something. Null-ish spellings the model
/// emits ("null", "none", "n/a", "unknown") count as absent.
fn coerce_string(value: serde_json::Value) -> Option<String> {
    let s = value.as_str()?.trim().to_string();
    match s.to_lowercase().as_str() {
        "" | "null" | "none" | "n/a" | "na" | "unknown" => None,
        _ => Some(s),
    }
}

/// A numeric value, whether the model wrote `0.9`, `"0.9"`, or `"90%"`.
fn coerce_number(value: &serde_json::Value) -> Option<f32> {
    if let Some(n) = value.as_f64() {
        return Some(n as f32);
    }
    let s = value.as_str()?.trim().trim_end_matches('%').trim();
    s.parse::<f32>().ok()
}

fn collect_strings(values: Option<Vec<serde_json::Value>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lenient severity label mapping.
pub fn parse_severity_label(label: &str) -> Option<Severity> {
    match label.trim().to_lowercase().as_str() {
        "none" => Some(Severity::None),
        "low" | "mild" | "early" => Some(Severity::Low),
        "medium" | "moderate" => Some(Severity::Medium),
        "high" | "severe" | "critical" => Some(Severity::High),
        _ => None,
    }
}
