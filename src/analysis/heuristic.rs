//! Heuristic fallback when the model ignores the JSON contract.
//!
//! Pure text scanning over the lowercased response. Precedence is fixed: an
//! explicit healthy phrase anywhere in the text decides "no disease" even if
//! disease vocabulary appears elsewhere. Only then are disease keywords
//! consulted.

use std::sync::OnceLock;

use regex::Regex;

use super::parser::RawAssessment;
use super::types::Severity;

/// Phrases that decide "healthy" outright. Deliberately multi-word — a bare
/// "healthy" would also match "unhealthy".
const HEALTHY_PHRASES: &[&str] = &[
    "no disease",
    "no diseases",
    "no sign of disease",
    "no signs of disease",
    "no visible disease",
    "no evidence of disease",
    "disease-free",
    "disease free",
    "free of disease",
    "looks healthy",
    "appears healthy",
    "is healthy",
    "perfectly healthy",
    "completely healthy",
    "healthy mango",
    "healthy leaf",
    "healthy fruit",
    "no infection",
];

const DISEASE_KEYWORDS: &[&str] = &[
    "disease",
    "infect",
    "fungal",
    "fungus",
    "bacterial",
    "rot",
    "lesion",
    "blight",
    "mildew",
    "mold",
    "mould",
    "wilt",
    "canker",
    "dieback",
    "scab",
    "spot",
    "malformation",
    "necrosis",
    "rust",
];

/// Catalog of known mango conditions: trigger phrases, canonical name, and a
/// stock recommendation surfaced when the model offered none.
struct ConditionEntry {
    triggers: &'static [&'static str],
    name: &'static str,
    advice: &'static str,
}

const CONDITION_CATALOG: &[ConditionEntry] = &[
    ConditionEntry {
        triggers: &["anthracnose"],
        name: "Anthracnose",
        advice: "Remove affected parts and apply a copper-based fungicide.",
    },
    ConditionEntry {
        triggers: &["powdery mildew", "white powdery", "powdery coating"],
        name: "Powdery Mildew",
        advice: "Apply wettable sulfur and improve air circulation in the canopy.",
    },
    ConditionEntry {
        triggers: &["black spot", "bacterial spot", "bacterial canker"],
        name: "Bacterial Black Spot",
        advice: "Prune infected twigs and use copper sprays during wet weather.",
    },
    ConditionEntry {
        triggers: &["sooty mold", "sooty mould", "black sooty"],
        name: "Sooty Mold",
        advice: "Control sap-sucking insects and wash off the mold deposits.",
    },
    ConditionEntry {
        triggers: &["stem end rot", "stem-end rot"],
        name: "Stem End Rot",
        advice: "Harvest with stalks attached and store fruit cool and dry.",
    },
    ConditionEntry {
        triggers: &["malformation"],
        name: "Mango Malformation",
        advice: "Prune malformed panicles well below the affected tissue.",
    },
    ConditionEntry {
        triggers: &["dieback", "die-back"],
        name: "Dieback",
        advice: "Cut back to healthy wood and seal cuts with a fungicidal paste.",
    },
    ConditionEntry {
        triggers: &["red rust", "algal spot"],
        name: "Red Rust",
        advice: "Copper oxychloride sprays check algal growth.",
    },
    ConditionEntry {
        triggers: &["scab"],
        name: "Mango Scab",
        advice: "Apply a protectant fungicide at flowering and fruit set.",
    },
    ConditionEntry {
        triggers: &["leaf spot", "alternaria", "grey blight", "gray blight"],
        name: "Leaf Spot",
        advice: "Remove fallen leaves and apply mancozeb if spread continues.",
    },
];

/// Symptom vocabulary → display label.
const SYMPTOM_TAGS: &[(&str, &str)] = &[
    ("black spot", "Dark lesions on the surface"),
    ("dark spot", "Dark lesions on the surface"),
    ("dark lesion", "Dark lesions on the surface"),
    ("sunken", "Soft, sunken areas"),
    ("mushy", "Soft, sunken areas"),
    ("yellow", "Yellowing tissue"),
    ("wilt", "Wilting"),
    ("powdery", "Powdery white coating"),
    ("white coating", "Powdery white coating"),
    ("shrivel", "Shriveled tissue"),
    ("curl", "Curled leaf edges"),
    ("hole", "Holes in the leaf"),
    ("sticky", "Sticky residue"),
    ("honeydew", "Sticky residue"),
    ("crack", "Cracked skin"),
];

const HIGH_QUALIFIERS: &[&str] = &[
    "clearly",
    "definitely",
    "certainly",
    "obvious",
    "unmistakab",
    "without doubt",
];

const LOW_QUALIFIERS: &[&str] = &[
    "possibly",
    "might",
    "may be",
    "maybe",
    "perhaps",
    "could be",
    "uncertain",
    "hard to tell",
    "appears to",
];

const HIGH_INTENSITY: &[&str] = &[
    "severe",
    "advanced",
    "extensive",
    "widespread",
    "heavily",
    "badly",
];

const LOW_INTENSITY: &[&str] = &[
    "mild",
    "slight",
    "early stage",
    "early-stage",
    "minor",
    "small patch",
    "just beginning",
];

const CONFIDENCE_HIGH: f32 = 0.9;
const CONFIDENCE_MEDIUM: f32 = 0.6;
const CONFIDENCE_LOW: f32 = 0.4;

/// Derive an assessment from free-form text. Always produces a value.
pub fn assess(text: &str) -> RawAssessment {
    let lower = text.to_lowercase();

    let healthy = HEALTHY_PHRASES.iter().any(|p| lower.contains(p));
    let diseased = !healthy && DISEASE_KEYWORDS.iter().any(|k| lower.contains(k));

    let condition = if diseased { match_condition(&lower) } else { None };

    RawAssessment {
        disease_detected: Some(diseased),
        disease_name: condition.map(|c| c.name.to_string()),
        confidence: Some(estimate_confidence(&lower)),
        symptoms: if diseased { collect_symptoms(&lower) } else { vec![] },
        recommendations: condition
            .map(|c| vec![c.advice.to_string()])
            .unwrap_or_default(),
        severity: Some(if diseased {
            estimate_severity(&lower)
        } else {
            Severity::None
        }),
    }
}

fn match_condition(lower: &str) -> Option<&'static ConditionEntry> {
    CONDITION_CATALOG
        .iter()
        .find(|entry| entry.triggers.iter().any(|t| lower.contains(t)))
}

/// Qualifier words set the band; an explicit percentage figure wins.
fn estimate_confidence(lower: &str) -> f32 {
    if let Some(pct) = extract_percent(lower) {
        return pct;
    }
    if HIGH_QUALIFIERS.iter().any(|q| lower.contains(q)) {
        CONFIDENCE_HIGH
    } else if LOW_QUALIFIERS.iter().any(|q| lower.contains(q)) {
        CONFIDENCE_LOW
    } else {
        CONFIDENCE_MEDIUM
    }
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,3})\s*%").expect("valid regex"))
}

fn extract_percent(lower: &str) -> Option<f32> {
    let captures = percent_re().captures(lower)?;
    let value: u32 = captures[1].parse().ok()?;
    if (1..=100).contains(&value) {
        Some(value as f32 / 100.0)
    } else {
        None
    }
}

fn collect_symptoms(lower: &str) -> Vec<String> {
    let mut symptoms: Vec<String> = Vec::new();
    for (keyword, label) in SYMPTOM_TAGS {
        if lower.contains(keyword) && !symptoms.iter().any(|s| s == label) {
            symptoms.push((*label).to_string());
        }
    }
    symptoms
}

/// Intensity qualifiers decide severity; ambiguous text defaults to Medium.
fn estimate_severity(lower: &str) -> Severity {
    if HIGH_INTENSITY.iter().any(|w| lower.contains(w)) {
        Severity::High
    } else if LOW_INTENSITY.iter().any(|w| lower.contains(w)) {
        Severity::Low
    } else {
        Severity::Medium
    }
}
