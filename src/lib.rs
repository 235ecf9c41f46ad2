//! MangoLens analysis core.
//!
//! Content-addressed memoization of multimodal AI analyses of mango
//! photographs: fingerprint → cache probe → preprocess → detect item →
//! specialized disease analysis → optional variety pass → strictly-validated
//! outcome. The interpreter is the last line of defense between free-form
//! model text and the domain invariants — a flagged disease always carries a
//! name, a healthy record never does.
//!
//! This crate is a library-level subsystem. The mobile shell owns capture,
//! presentation, and persistence; the inference provider is reached through
//! the [`gateway::VisionGateway`] seam and can be replaced with a test
//! double. Embedding applications own `tracing` subscriber setup.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod fingerprint;
pub mod gateway;
pub mod preprocess;

pub use analysis::{
    AnalysisError, AnalysisOutcome, AnalysisService, ItemCategory, MangoVariety, Severity,
    VarietyAssessment,
};
pub use cache::{CacheMetrics, CacheStats};
pub use config::AnalysisConfig;
pub use fingerprint::{fingerprint, ImageFingerprint};
pub use gateway::{GatewayError, HttpVisionGateway, VisionGateway};
pub use preprocess::{ImagePreprocessor, PreparedImage, StandardPreprocessor};
