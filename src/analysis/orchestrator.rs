//! Analysis pipeline orchestration.
//!
//! **Why this exists**: provider calls are slow, metered, and nondeterministic.
//! Repeat analyses of the same photo must be answered from memory, and a
//! single user request must survive partial provider availability. The
//! service owns both caches and the full fingerprint → detect → analyze →
//! variety sequence; the caller persists outcomes externally.
//!
//! Ordering rules:
//! - No gateway call ever runs while a cache lock is held.
//! - Nothing is written to the outcome cache until the full outcome is
//!   assembled, so an abandoned request needs no rollback.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::cache::{CacheMetrics, CacheStats, OutcomeCache, PreparedImageCache};
use crate::config::AnalysisConfig;
use crate::fingerprint::{fingerprint, ImageFingerprint};
use crate::gateway::{http, HttpVisionGateway, VisionGateway};
use crate::preprocess::{ImagePreprocessor, PreparedImage, StandardPreprocessor};

use super::detect::parse_detection_response;
use super::interpreter::interpret;
use super::parser::parse_variety_response;
use super::prompts::{analysis_prompt_for, DETECTION_PROMPT, VARIETY_PROMPT};
use super::types::{AnalysisOutcome, ItemCategory, Severity, VarietyAssessment};
use super::AnalysisError;

/// Transient gateway failures get one retry on the primary analysis call.
const MAX_PRIMARY_ATTEMPTS: usize = 2;

/// The public pipeline: fingerprint → cache probe → preprocess → detect →
/// specialized analysis → optional variety pass → cache store.
pub struct AnalysisService {
    gateway: Box<dyn VisionGateway>,
    preprocessor: Box<dyn ImagePreprocessor>,
    outcomes: OutcomeCache,
    images: PreparedImageCache,
    metrics: Arc<CacheMetrics>,
}

impl AnalysisService {
    pub fn new(
        gateway: Box<dyn VisionGateway>,
        preprocessor: Box<dyn ImagePreprocessor>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            gateway,
            preprocessor,
            outcomes: OutcomeCache::new(config.outcome_cache_capacity, config.outcome_expiry),
            images: PreparedImageCache::new(config.image_cache_capacity),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    /// Production assembly: HTTP gateway plus standard preprocessor, wired
    /// from one policy bag.
    pub fn from_config(config: &AnalysisConfig, api_key: &str) -> Self {
        Self::new(
            Box::new(HttpVisionGateway::new(
                http::DEFAULT_BASE_URL,
                api_key,
                &config.model,
                http::DEFAULT_TIMEOUT_SECS,
            )),
            Box::new(StandardPreprocessor::from_config(config)),
            config,
        )
    }

    /// Analyze one photograph.
    ///
    /// `resolve_mime` is invoked at most once, and only on a cache-miss run —
    /// resolving the platform MIME type can be costly and a cache hit never
    /// needs it.
    pub fn analyze<F>(
        &self,
        raw_bytes: &[u8],
        resolve_mime: F,
    ) -> Result<AnalysisOutcome, AnalysisError>
    where
        F: FnOnce() -> Option<String>,
    {
        if raw_bytes.is_empty() {
            return Err(AnalysisError::EmptyImage);
        }

        let key = fingerprint(raw_bytes);
        let request_id = Uuid::new_v4();
        let _span =
            tracing::info_span!("analyze", request = %request_id, image = key.short()).entered();

        if let Some(cached) = self.outcomes.get(&key) {
            self.metrics.record_hit();
            tracing::debug!("outcome served from cache");
            return Ok(cached);
        }
        self.metrics.record_miss();

        let prepared = self.prepared_image(&key, raw_bytes, resolve_mime)?;

        // Detection degrades instead of failing: partial provider
        // availability should not block the user from getting a result.
        let category = match self
            .gateway
            .submit(&prepared.bytes, &prepared.mime_type, DETECTION_PROMPT)
        {
            Ok(text) => parse_detection_response(&text),
            Err(err) => {
                tracing::warn!(%err, "detection call failed; returning neutral outcome");
                // Not cached: a transient failure must not be memoized for
                // the full expiry window.
                return Ok(Self::neutral_outcome());
            }
        };
        tracing::debug!(%category, "item detected");

        let analysis_text = self.submit_primary(&prepared, analysis_prompt_for(category))?;
        let interp = interpret(&analysis_text, category);
        tracing::debug!(
            source = ?interp.source,
            disease = interp.disease_detected,
            "analysis interpreted"
        );

        let variety = if category == ItemCategory::Fruit {
            self.identify_variety(&prepared)
        } else {
            None
        };

        let outcome = AnalysisOutcome {
            item_category: category,
            disease_detected: interp.disease_detected,
            disease_name: interp.disease_name,
            confidence: interp.confidence,
            symptoms: interp.symptoms,
            recommendations: interp.recommendations,
            severity: interp.severity,
            variety,
            raw_model_text: analysis_text,
            analyzed_at: Utc::now(),
        };
        debug_assert!(outcome.satisfies_invariants());

        self.outcomes.put(key, outcome.clone());
        Ok(outcome)
    }

    /// Management hook: drop both caches.
    pub fn clear_caches(&self) {
        self.outcomes.clear();
        self.images.clear();
        tracing::info!("analysis caches cleared");
    }

    /// Occupancy of the outcome cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.outcomes.stats()
    }

    /// Occupancy of the prepared-image cache.
    pub fn image_cache_stats(&self) -> CacheStats {
        self.images.stats()
    }

    /// Hit/miss accounting for the outcome cache.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    // ── Internal ────────────────────────────────────────────

    /// Cached prepared image, or build and cache one.
    fn prepared_image<F>(
        &self,
        key: &ImageFingerprint,
        raw_bytes: &[u8],
        resolve_mime: F,
    ) -> Result<Arc<PreparedImage>, AnalysisError>
    where
        F: FnOnce() -> Option<String>,
    {
        if let Some(hit) = self.images.get(key) {
            tracing::debug!("prepared image served from cache");
            return Ok(hit);
        }

        let mime_hint = resolve_mime();
        let prepared = self
            .preprocessor
            .prepare(raw_bytes, mime_hint.as_deref())?;
        Ok(self.images.put(key.clone(), prepared))
    }

    /// Primary analysis call with one retry on transient failures.
    fn submit_primary(
        &self,
        prepared: &PreparedImage,
        prompt: &str,
    ) -> Result<String, AnalysisError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .gateway
                .submit(&prepared.bytes, &prepared.mime_type, prompt)
            {
                Ok(text) => return Ok(text),
                Err(err) if err.is_transient() && attempt < MAX_PRIMARY_ATTEMPTS => {
                    tracing::warn!(%err, attempt, "analysis call failed; retrying");
                }
                Err(err) => return Err(AnalysisError::Gateway(err)),
            }
        }
    }

    /// Best-effort variety pass. Failure is logged, never surfaced.
    fn identify_variety(&self, prepared: &PreparedImage) -> Option<VarietyAssessment> {
        match self
            .gateway
            .submit(&prepared.bytes, &prepared.mime_type, VARIETY_PROMPT)
        {
            Ok(text) => {
                let parsed = parse_variety_response(&text);
                if parsed.is_none() {
                    tracing::debug!("variety response not parseable; skipping");
                }
                parsed
            }
            Err(err) => {
                tracing::warn!(%err, "variety identification failed; continuing without it");
                None
            }
        }
    }

    /// Neutral, non-judgmental outcome for a failed detection step.
    fn neutral_outcome() -> AnalysisOutcome {
        AnalysisOutcome {
            item_category: ItemCategory::Unrelated,
            disease_detected: false,
            disease_name: None,
            confidence: 0.0,
            symptoms: vec![],
            recommendations: vec![
                "The analysis service could not be reached. Check your connection and try again."
                    .to_string(),
            ],
            severity: Severity::None,
            variety: None,
            raw_model_text: String::new(),
            analyzed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, MockGateway};
    use crate::preprocess::{MockPreprocessor, PreprocessError};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const IMG: &[u8] = b"jpeg-ish bytes standing in for a mango photo";

    /// Opt-in test logging: RUST_LOG=debug cargo test -- --nocapture
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn fruit_detection() -> &'static str {
        r#"{"category": "fruit"}"#
    }

    fn leaf_detection() -> &'static str {
        r#"{"category": "leaf"}"#
    }

    fn diseased_fruit_response() -> &'static str {
        r#"Here is my assessment:

```json
{
  "disease_detected": true,
  "disease_name": "Anthracnose",
  "confidence": 0.88,
  "symptoms": ["Dark sunken lesions"],
  "recommendations": ["Apply copper-based fungicide"],
  "severity": "medium"
}
```"#
    }

    fn healthy_leaf_response() -> &'static str {
        r#"```json
{"disease_detected": false, "disease_name": null, "confidence": 0.95, "symptoms": [], "recommendations": [], "severity": "none"}
```"#
    }

    fn variety_response() -> &'static str {
        r#"```json
{"variety": "Chaunsa", "confidence": 0.7, "characteristics": ["golden skin"], "description": "Sweet table mango."}
```"#
    }

    fn service(gateway: MockGateway) -> (AnalysisService, Arc<MockGateway>) {
        // Keep a handle to the mock for call-count assertions.
        let gateway = Arc::new(gateway);
        let boxed: Box<dyn VisionGateway> = Box::new(SharedGateway(Arc::clone(&gateway)));
        let service = AnalysisService::new(
            boxed,
            Box::new(MockPreprocessor::new()),
            &AnalysisConfig::default(),
        );
        (service, gateway)
    }

    /// Forwards to an `Arc<MockGateway>` so tests keep a counting handle.
    struct SharedGateway(Arc<MockGateway>);

    impl VisionGateway for SharedGateway {
        fn submit(
            &self,
            image: &[u8],
            mime_type: &str,
            prompt: &str,
        ) -> Result<String, GatewayError> {
            self.0.submit(image, mime_type, prompt)
        }
    }

    /// Preprocessor that counts invocations.
    struct CountingPreprocessor(Arc<AtomicUsize>);

    impl ImagePreprocessor for CountingPreprocessor {
        fn prepare(
            &self,
            raw_bytes: &[u8],
            mime_hint: Option<&str>,
        ) -> Result<crate::preprocess::PreparedImage, PreprocessError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            MockPreprocessor::new().prepare(raw_bytes, mime_hint)
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        let (service, gateway) = service(MockGateway::new());
        let result = service.analyze(&[], || None);
        assert!(matches!(result, Err(AnalysisError::EmptyImage)));
        assert_eq!(gateway.calls(), 0);
    }

    #[test]
    fn fruit_pipeline_end_to_end() {
        init_tracing();
        let (service, gateway) = service(
            MockGateway::new()
                .with_response(fruit_detection())
                .with_response(diseased_fruit_response())
                .with_response(variety_response()),
        );

        let outcome = service.analyze(IMG, || Some("image/jpeg".into())).unwrap();
        assert_eq!(gateway.calls(), 3, "detection + analysis + variety");
        assert_eq!(outcome.item_category, ItemCategory::Fruit);
        assert!(outcome.disease_detected);
        assert_eq!(outcome.disease_name.as_deref(), Some("Anthracnose"));
        assert_eq!(outcome.severity, Severity::Medium);
        assert_eq!(
            outcome.variety.as_ref().unwrap().variety,
            crate::analysis::types::MangoVariety::Chaunsa
        );
        assert!(outcome.raw_model_text.contains("Anthracnose"));
        assert!(outcome.satisfies_invariants());
    }

    #[test]
    fn leaf_pipeline_skips_variety() {
        let (service, gateway) = service(
            MockGateway::new()
                .with_response(leaf_detection())
                .with_response(healthy_leaf_response()),
        );

        let outcome = service.analyze(IMG, || None).unwrap();
        assert_eq!(gateway.calls(), 2, "no variety call for a leaf");
        assert_eq!(outcome.item_category, ItemCategory::Leaf);
        assert!(!outcome.disease_detected);
        assert!(outcome.variety.is_none());
    }

    #[test]
    fn repeat_image_is_served_from_cache() {
        let (service, gateway) = service(
            MockGateway::new()
                .with_response(fruit_detection())
                .with_response(diseased_fruit_response())
                .with_response(variety_response()),
        );

        let first = service.analyze(IMG, || None).unwrap();
        assert_eq!(gateway.calls(), 3);

        let second = service.analyze(IMG, || None).unwrap();
        assert_eq!(gateway.calls(), 3, "cache hit must not touch the gateway");
        assert_eq!(second, first, "cached outcome is returned verbatim");

        let snap = service.metrics().snapshot();
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 1);
    }

    #[test]
    fn mime_resolver_is_not_called_on_cache_hit() {
        let (service, _gateway) = service(
            MockGateway::new()
                .with_response(leaf_detection())
                .with_response(healthy_leaf_response()),
        );

        let resolved = Cell::new(0u32);
        service
            .analyze(IMG, || {
                resolved.set(resolved.get() + 1);
                Some("image/png".into())
            })
            .unwrap();
        assert_eq!(resolved.get(), 1);

        service
            .analyze(IMG, || {
                resolved.set(resolved.get() + 1);
                Some("image/png".into())
            })
            .unwrap();
        assert_eq!(resolved.get(), 1, "hit path never resolves the MIME type");
    }

    #[test]
    fn detection_failure_degrades_to_neutral_outcome() {
        let (service, gateway) = service(
            MockGateway::new().with_failure(GatewayError::Network("connection refused".into())),
        );

        let outcome = service.analyze(IMG, || None).unwrap();
        assert_eq!(gateway.calls(), 1);
        assert_eq!(outcome.item_category, ItemCategory::Unrelated);
        assert!(!outcome.disease_detected);
        assert_eq!(outcome.severity, Severity::None);
        assert!(outcome.satisfies_invariants());
    }

    #[test]
    fn neutral_outcome_is_not_cached() {
        let (service, gateway) = service(
            MockGateway::new()
                .with_failure(GatewayError::Network("offline".into()))
                .with_response(leaf_detection())
                .with_response(healthy_leaf_response()),
        );

        let degraded = service.analyze(IMG, || None).unwrap();
        assert_eq!(degraded.item_category, ItemCategory::Unrelated);
        assert_eq!(service.cache_stats().size, 0, "neutral outcome not stored");

        // The next attempt retries the full pipeline and succeeds.
        let recovered = service.analyze(IMG, || None).unwrap();
        assert_eq!(recovered.item_category, ItemCategory::Leaf);
        assert_eq!(gateway.calls(), 3);
    }

    #[test]
    fn primary_failure_is_a_typed_error() {
        let (service, _gateway) = service(
            MockGateway::new()
                .with_response(fruit_detection())
                .with_failure(GatewayError::Auth),
        );

        let result = service.analyze(IMG, || None);
        match result {
            Err(AnalysisError::Gateway(GatewayError::Auth)) => {}
            other => panic!("Expected gateway auth error, got: {other:?}"),
        }
        assert_eq!(service.cache_stats().size, 0);
    }

    #[test]
    fn transient_primary_failure_retries_once() {
        let (service, gateway) = service(
            MockGateway::new()
                .with_response(leaf_detection())
                .with_failure(GatewayError::Timeout(60))
                .with_response(healthy_leaf_response()),
        );

        let outcome = service.analyze(IMG, || None).unwrap();
        assert_eq!(gateway.calls(), 3, "detection + failed attempt + retry");
        assert_eq!(outcome.item_category, ItemCategory::Leaf);
    }

    #[test]
    fn exhausted_retries_surface_the_error() {
        let (service, gateway) = service(
            MockGateway::new()
                .with_response(leaf_detection())
                .with_failure(GatewayError::Timeout(60))
                .with_failure(GatewayError::Timeout(60)),
        );

        let result = service.analyze(IMG, || None);
        assert!(matches!(
            result,
            Err(AnalysisError::Gateway(GatewayError::Timeout(_)))
        ));
        assert_eq!(gateway.calls(), 3);
    }

    #[test]
    fn variety_failure_never_fails_the_outcome() {
        let (service, gateway) = service(
            MockGateway::new()
                .with_response(fruit_detection())
                .with_response(diseased_fruit_response())
                .with_failure(GatewayError::RateLimited),
        );

        let outcome = service.analyze(IMG, || None).unwrap();
        assert_eq!(gateway.calls(), 3);
        assert!(outcome.variety.is_none());
        assert!(outcome.disease_detected, "primary result intact");
        assert_eq!(service.cache_stats().size, 1, "outcome still cached");
    }

    #[test]
    fn unparseable_variety_response_is_skipped() {
        let (service, _gateway) = service(
            MockGateway::new()
                .with_response(fruit_detection())
                .with_response(diseased_fruit_response())
                .with_response("I really cannot tell the variety."),
        );

        let outcome = service.analyze(IMG, || None).unwrap();
        assert!(outcome.variety.is_none());
        assert!(outcome.disease_detected);
    }

    #[test]
    fn unrelated_image_never_reports_disease() {
        let (service, gateway) = service(
            MockGateway::new()
                .with_response(r#"{"category": "unrelated"}"#)
                .with_response("A rusty bicycle leaning against a moldy wall."),
        );

        let outcome = service.analyze(IMG, || None).unwrap();
        assert_eq!(gateway.calls(), 2, "no variety call for unrelated images");
        assert_eq!(outcome.item_category, ItemCategory::Unrelated);
        assert!(!outcome.disease_detected, "neutral route emits no disease");
        assert_eq!(outcome.severity, Severity::None);
    }

    #[test]
    fn prepared_image_is_reused_across_pipeline_runs() {
        let prep_calls = Arc::new(AtomicUsize::new(0));
        let gateway = Arc::new(
            MockGateway::new()
                .with_failure(GatewayError::Network("offline".into()))
                .with_response(leaf_detection())
                .with_response(healthy_leaf_response()),
        );
        let service = AnalysisService::new(
            Box::new(SharedGateway(Arc::clone(&gateway))),
            Box::new(CountingPreprocessor(Arc::clone(&prep_calls))),
            &AnalysisConfig::default(),
        );

        // First run degrades (nothing cached in the outcome cache) …
        service.analyze(IMG, || None).unwrap();
        // … second run re-enters the pipeline but reuses the prepared image.
        service.analyze(IMG, || None).unwrap();

        assert_eq!(prep_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.image_cache_stats().size, 1);
    }

    #[test]
    fn preprocess_validation_failure_is_fatal() {
        let gateway: Box<dyn VisionGateway> = Box::new(MockGateway::new());
        let service = AnalysisService::new(
            gateway,
            Box::new(MockPreprocessor::failing()),
            &AnalysisConfig::default(),
        );

        let result = service.analyze(IMG, || None);
        assert!(matches!(result, Err(AnalysisError::Preprocess(_))));
    }

    #[test]
    fn clear_caches_forces_a_fresh_pipeline_run() {
        let (service, gateway) = service(
            MockGateway::new()
                .with_response(leaf_detection())
                .with_response(healthy_leaf_response())
                .with_response(leaf_detection())
                .with_response(healthy_leaf_response()),
        );

        service.analyze(IMG, || None).unwrap();
        assert_eq!(service.cache_stats().size, 1);

        service.clear_caches();
        assert_eq!(service.cache_stats().size, 0);
        assert_eq!(service.image_cache_stats().size, 0);

        service.analyze(IMG, || None).unwrap();
        assert_eq!(gateway.calls(), 4, "cleared cache means a full re-run");
    }

    #[test]
    fn production_assembly_constructs() {
        let service = AnalysisService::from_config(&AnalysisConfig::default(), "test-key");
        assert_eq!(service.cache_stats().capacity, 50);
        assert_eq!(service.image_cache_stats().capacity, 10);
    }

    #[test]
    fn distinct_images_get_distinct_entries() {
        let (service, _gateway) = service(
            MockGateway::new()
                .with_response(leaf_detection())
                .with_response(healthy_leaf_response())
                .with_response(fruit_detection())
                .with_response(diseased_fruit_response())
                .with_response(variety_response()),
        );

        let a = service.analyze(b"photo A", || None).unwrap();
        let b = service.analyze(b"photo B", || None).unwrap();
        assert_ne!(a.item_category, b.item_category);
        assert_eq!(service.cache_stats().size, 2);
    }
}
