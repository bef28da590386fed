use lectern_core::error::LecternError;

/// Failure of a single text-generation call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("the service returned no content")]
    EmptyResponse,

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("invalid generator configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::Parse(err.to_string())
        } else {
            LlmError::Request(err.to_string())
        }
    }
}

impl From<LlmError> for LecternError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Config(msg) => LecternError::Config(msg),
            other => LecternError::Generation(other.to_string()),
        }
    }
}
