//! Domain records produced by the analysis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the detection step decided the photograph shows. Mutually exclusive,
/// decided once per image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    /// A mango fruit — eligible for variety identification.
    Fruit,
    /// Mango foliage.
    Leaf,
    /// Anything else; analyzed with a neutral observational prompt.
    Unrelated,
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fruit => write!(f, "mango fruit"),
            Self::Leaf => write!(f, "mango leaf"),
            Self::Unrelated => write!(f, "unrelated"),
        }
    }
}

/// How far a detected condition has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

/// Commercial mango varieties the model is asked to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MangoVariety {
    Alphonso,
    Sindhri,
    Chaunsa,
    AnwarRatol,
    Langra,
    Dasheri,
    Kent,
    Keitt,
    Other,
}

impl MangoVariety {
    /// Lenient mapping from a model-reported label.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_lowercase();
        if lower.contains("alphonso") || lower.contains("hapus") {
            Self::Alphonso
        } else if lower.contains("sindhri") || lower.contains("sindhi") {
            Self::Sindhri
        } else if lower.contains("chaunsa") || lower.contains("chausa") {
            Self::Chaunsa
        } else if lower.contains("anwar") || lower.contains("ratol") {
            Self::AnwarRatol
        } else if lower.contains("langra") {
            Self::Langra
        } else if lower.contains("dasheri") || lower.contains("dashehari") {
            Self::Dasheri
        } else if lower.contains("kent") {
            Self::Kent
        } else if lower.contains("keitt") {
            Self::Keitt
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for MangoVariety {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alphonso => write!(f, "Alphonso"),
            Self::Sindhri => write!(f, "Sindhri"),
            Self::Chaunsa => write!(f, "Chaunsa"),
            Self::AnwarRatol => write!(f, "Anwar Ratol"),
            Self::Langra => write!(f, "Langra"),
            Self::Dasheri => write!(f, "Dasheri"),
            Self::Kent => write!(f, "Kent"),
            Self::Keitt => write!(f, "Keitt"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Best-effort secondary result — present only for fruit photographs, and
/// absence is never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarietyAssessment {
    pub variety: MangoVariety,
    pub confidence: f32,
    pub characteristics: Vec<String>,
    pub description: String,
}

/// The resolved result of analyzing one image.
///
/// Constructed exactly once per cache-miss pipeline run (or cloned verbatim
/// from cache on a hit) and immutable afterward. The caller persists
/// long-lived copies externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub item_category: ItemCategory,
    pub disease_detected: bool,
    /// Non-empty whenever `disease_detected`, absent otherwise.
    pub disease_name: Option<String>,
    pub confidence: f32,
    pub symptoms: Vec<String>,
    pub recommendations: Vec<String>,
    pub severity: Severity,
    pub variety: Option<VarietyAssessment>,
    /// Original model text, retained for audit and debugging.
    pub raw_model_text: String,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisOutcome {
    /// Every consistency rule the interpreter guarantees. Used by tests and
    /// debug assertions; production code relies on the repair step instead.
    pub fn satisfies_invariants(&self) -> bool {
        let name_rule = match (self.disease_detected, &self.disease_name) {
            (true, Some(name)) => !name.trim().is_empty(),
            (false, None) => true,
            _ => false,
        };
        let severity_rule = (self.severity == Severity::None) == !self.disease_detected;
        let confidence_rule = (0.0..=1.0).contains(&self.confidence);
        let variety_rule =
            self.variety.is_none() || self.item_category == ItemCategory::Fruit;
        name_rule && severity_rule && confidence_rule && variety_rule
    }
}
