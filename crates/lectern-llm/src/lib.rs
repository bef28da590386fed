//! Lectern LLM crate - text-generation collaborator.
//!
//! Defines the `TextGenerator` seam used by the document orchestrator, an
//! OpenAI-compatible chat-completions client, and a scripted mock.

pub mod error;
pub mod openai;

use std::collections::{BTreeSet, VecDeque};
use std::future::Future;
use std::sync::Mutex;

pub use error::LlmError;
pub use openai::OpenAiCompatGenerator;

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System message framing the assistant.
    pub system_role: String,
    /// User message.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_output: u32,
    pub temperature: f32,
}

/// Service turning a prompt into text.
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock generator.
///
/// Calls are numbered from 1. Calls listed in `failing_on` fail with a 500
/// status; the rest consume scripted replies, then fall back to the default
/// body. Every request is recorded.
#[derive(Debug)]
pub struct MockTextGenerator {
    default_body: String,
    script: Mutex<VecDeque<String>>,
    failing: BTreeSet<usize>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new("[mock generated text]")
    }
}

impl MockTextGenerator {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            default_body: body.into(),
            script: Mutex::new(VecDeque::new()),
            failing: BTreeSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `replies` in order before falling back to the default body.
    pub fn scripted(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mock = Self::default();
        if let Ok(mut script) = mock.script.lock() {
            script.extend(replies.into_iter().map(Into::into));
        }
        mock
    }

    /// Make the given 1-based calls fail.
    pub fn failing_on(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(calls);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl TextGenerator for MockTextGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let call = match self.requests.lock() {
            Ok(mut requests) => {
                requests.push(request.clone());
                requests.len()
            }
            Err(_) => 0,
        };

        if self.failing.contains(&call) {
            tracing::debug!(call, "Mock generation failing");
            return Err(LlmError::Status {
                status: 500,
                message: format!("mock failure on call {}", call),
            });
        }

        let body = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.default_body.clone());
        Ok(body)
    }
}
