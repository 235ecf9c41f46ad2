//! Classification pipeline and response interpretation.

pub mod detect;
pub mod heuristic;
pub mod interpreter;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod repair;
pub mod types;

pub use interpreter::{interpret, AssessmentSource, Interpretation};
pub use orchestrator::AnalysisService;
pub use repair::UNIDENTIFIED_DISEASE;
pub use types::{
    AnalysisOutcome, ItemCategory, MangoVariety, Severity, VarietyAssessment,
};

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::preprocess::PreprocessError;

/// Request-fatal failures surfaced to the caller.
///
/// Recoverable failures never appear here: structured-decode errors fall
/// through to the heuristic path, and variety sub-analysis errors are logged
/// and swallowed.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no image data was provided")]
    EmptyImage,

    #[error("image preparation failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("analysis request failed: {0}")]
    Gateway(#[from] GatewayError),
}
