//! Abstracted access to the multimodal inference provider.
//!
//! The core talks to exactly one operation: submit an image plus a prompt,
//! get text back. Everything else about the provider (endpoint shape,
//! authentication, response framing) lives behind [`VisionGateway`] so the
//! pipeline can be exercised against a scripted double.

pub mod http;

pub use http::HttpVisionGateway;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use thiserror::Error;

/// Provider failures, translated to stable user-presentable categories.
///
/// Raw provider text never crosses this boundary as the primary signal — the
/// embedding application maps these variants to its own messaging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("the model is overloaded; try again shortly")]
    Overloaded,
    #[error("network error reaching the inference provider: {0}")]
    Network(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("authentication with the inference provider failed")]
    Auth,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("inference provider error: {0}")]
    Unknown(String),
}

impl GatewayError {
    /// Transient failures are worth one retry; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Overloaded | Self::Network(_) | Self::Timeout(_)
        )
    }
}

/// Single request/response call to the external inference engine.
///
/// Stateless, no streaming. This is the only blocking operation in the core
/// and must never be invoked while a cache lock is held.
pub trait VisionGateway: Send + Sync {
    /// Submit an image and a prompt; returns the model's raw text.
    fn submit(&self, image: &[u8], mime_type: &str, prompt: &str)
        -> Result<String, GatewayError>;
}

/// Scripted gateway for tests — returns queued results in order and counts
/// calls, so tests can assert "the second analyze never hit the network".
pub struct MockGateway {
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, text: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
        self
    }

    /// Queue a failure.
    pub fn with_failure(self, err: GatewayError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    /// How many times `submit` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl VisionGateway for MockGateway {
    fn submit(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _prompt: &str,
    ) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Unknown("mock script exhausted".into())))
    }
}
