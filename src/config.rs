use std::time::Duration;

/// Library-level constants
pub const CORE_NAME: &str = "MangoLens";
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Policy values for caches, preprocessing, and the model call.
///
/// Defaults mirror production behavior: resolved outcomes are memoized for a
/// day in a small LRU, prepared images only for the current session. Embedding
/// applications override individual fields as needed.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Maximum resolved outcomes held in memory.
    pub outcome_cache_capacity: usize,
    /// Age past which a cached outcome is treated as absent.
    pub outcome_expiry: Duration,
    /// Maximum prepared upload images held in memory.
    pub image_cache_capacity: usize,
    /// Square edge (pixels) the preprocessor fits images into.
    pub target_image_size: u32,
    /// JPEG quality for the re-encoded upload (1-100).
    pub jpeg_quality: u8,
    /// Model identifier sent with every gateway request.
    pub model: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            outcome_cache_capacity: 50,
            outcome_expiry: Duration::from_secs(24 * 60 * 60),
            image_cache_capacity: 10,
            target_image_size: 768,
            jpeg_quality: 85,
            model: "gemini-2.0-flash".to_string(),
        }
    }
}
