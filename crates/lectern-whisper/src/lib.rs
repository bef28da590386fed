//! Lectern Whisper crate - speech-to-text collaborator.
//!
//! Provides a trait-based abstraction over the transcription service, the
//! upload/result types, an OpenAI-compatible HTTP client, and a scripted mock
//! for exercising the session engine without network access.

pub mod http;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use lectern_core::error::LecternError;

pub use http::HttpTranscriptionService;

// =============================================================================
// Request / result types
// =============================================================================

/// Audio payload handed to the transcription service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    /// File name reported in the upload (its extension matters to some APIs).
    pub file_name: String,
    pub mime: String,
}

impl AudioUpload {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime: mime.into(),
        }
    }

    /// A 16 kHz mono WAV produced by the transcoder.
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "audio.wav", "audio/wav")
    }
}

/// The result of a transcription call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionResult {
    /// Full transcribed text; may be empty when nothing was recognized.
    pub text: String,
    /// Language the service was asked to use.
    pub language: String,
}

// =============================================================================
// Trait
// =============================================================================

/// Service for transcribing an audio payload to text.
pub trait TranscriptionService: Send + Sync {
    /// Transcribe `upload` using `language` as a hint (ISO 639-1, e.g. "ru").
    fn transcribe(
        &self,
        upload: &AudioUpload,
        language: &str,
    ) -> impl Future<Output = Result<TranscriptionResult, LecternError>> + Send;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Scripted reply of the mock service.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(String),
}

/// Mock transcription service.
///
/// Replies are consumed in order; once the script is exhausted the default
/// text is returned. Every call is recorded for assertions.
#[derive(Debug)]
pub struct MockTranscriptionService {
    default_text: String,
    script: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<(AudioUpload, String)>>,
}

impl Default for MockTranscriptionService {
    fn default() -> Self {
        Self::new("[mock transcription]")
    }
}

impl MockTranscriptionService {
    /// Always answer with `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            default_text: text.into(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `replies` in order, then fall back to `[mock transcription]`.
    pub fn scripted(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let mock = Self::default();
        if let Ok(mut script) = mock.script.lock() {
            script.extend(replies);
        }
        mock
    }

    /// Uploads and language hints received so far.
    pub fn calls(&self) -> Vec<(AudioUpload, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl TranscriptionService for MockTranscriptionService {
    async fn transcribe(
        &self,
        upload: &AudioUpload,
        language: &str,
    ) -> Result<TranscriptionResult, LecternError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((upload.clone(), language.to_string()));
        }

        if upload.bytes.is_empty() {
            return Err(LecternError::Transcription(
                "Cannot transcribe empty audio data".to_string(),
            ));
        }

        let reply = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| MockReply::Text(self.default_text.clone()));

        tracing::debug!(bytes = upload.bytes.len(), language, "Mock transcription generated");

        match reply {
            MockReply::Text(text) => Ok(TranscriptionResult {
                text,
                language: language.to_string(),
            }),
            MockReply::Fail(reason) => Err(LecternError::Transcription(reason)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
