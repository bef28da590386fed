//! Error types for the session engine.

use lectern_core::error::LecternError;
use lectern_core::types::Stage;

/// Errors from the session engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("input cannot be empty")]
    EmptyInput,
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error("requirements have not been provided")]
    MissingRequirements,
    #[error("part {segment} ({name}) failed: {reason}")]
    GenerationSegment {
        segment: usize,
        name: String,
        reason: String,
    },
    #[error("{event} is not accepted in stage {stage}")]
    UnexpectedEvent { stage: Stage, event: &'static str },
    #[error("session store error: {0}")]
    Store(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// True for errors already reported to the user; the conversation goes on.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyInput
                | ChatError::Transcription(_)
                | ChatError::MissingRequirements
                | ChatError::GenerationSegment { .. }
                | ChatError::UnexpectedEvent { .. }
        )
    }
}

impl From<LecternError> for ChatError {
    fn from(err: LecternError) -> Self {
        match err {
            LecternError::Audio(msg) | LecternError::Transcription(msg) => {
                ChatError::Transcription(msg)
            }
            LecternError::Transport(msg) => ChatError::Transport(msg),
            other => ChatError::Internal(other.to_string()),
        }
    }
}
