use thiserror::Error;

/// Top-level error type for the Lectern system.
///
/// Collaborator crates (audio, transcription, transport) report through these
/// variants so that `?` works across crate boundaries. The session engine
/// keeps its own user-facing taxonomy in `lectern_chat::ChatError`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LecternError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for LecternError {
    fn from(err: toml::de::Error) -> Self {
        LecternError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LecternError {
    fn from(err: toml::ser::Error) -> Self {
        LecternError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LecternError {
    fn from(err: serde_json::Error) -> Self {
        LecternError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Lectern operations.
pub type Result<T> = std::result::Result<T, LecternError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LecternError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(LecternError, &str)> = vec![
            (
                LecternError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                LecternError::Audio("unsupported codec".to_string()),
                "Audio error: unsupported codec",
            ),
            (
                LecternError::Transcription("empty result".to_string()),
                "Transcription error: empty result",
            ),
            (
                LecternError::Generation("quota exceeded".to_string()),
                "Generation error: quota exceeded",
            ),
            (
                LecternError::Transport("chat closed".to_string()),
                "Transport error: chat closed",
            ),
            (
                LecternError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: LecternError = io_err.into();
        assert!(matches!(err, LecternError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let err: LecternError = err.unwrap_err().into();
        assert!(matches!(err, LecternError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: LecternError = err.unwrap_err().into();
        assert!(matches!(err, LecternError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
