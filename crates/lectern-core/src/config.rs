use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LecternError, Result};
use crate::types::DocumentSpec;

/// Top-level configuration for the Lectern application.
///
/// Loaded from `~/.lectern/config.toml` by default. Each section corresponds
/// to one collaborator or to the document being produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LecternConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub document: DocumentConfig,
}

impl LecternConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LecternConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the session engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.document.segments.is_empty() {
            return Err(LecternError::Config(
                "document.segments must name at least one segment".to_string(),
            ));
        }
        if self.document.segments.iter().any(|s| s.trim().is_empty()) {
            return Err(LecternError::Config(
                "document.segments must not contain blank names".to_string(),
            ));
        }
        if self.transport.message_limit == 0 {
            return Err(LecternError::Config(
                "transport.message_limit must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(LecternError::Config(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory where delivered documents are written by the console transport.
    pub output_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            output_dir: "lectern-output".to_string(),
        }
    }
}

/// Text-generation service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API (without the `/chat/completions` suffix).
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// System role message framing every segment request.
    pub system_role: String,
    /// Upper bound on generated tokens per segment.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deep-foundation.tech/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            system_role: "You are an experienced lecturer and screenwriter.".to_string(),
            max_output_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 120,
            api_key_env: "DEEP_API_KEY".to_string(),
        }
    }
}

/// Speech-to-text service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URL of an OpenAI-compatible API (without `/audio/transcriptions`).
    pub base_url: String,
    /// Transcription model identifier.
    pub model: String,
    /// Language hint passed with every request (ISO 639-1).
    pub language: String,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deep-foundation.tech/v1".to_string(),
            model: "whisper-1".to_string(),
            language: "ru".to_string(),
            timeout_secs: 30,
            api_key_env: "DEEP_API_KEY".to_string(),
        }
    }
}

/// Audio transcoding configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Directory for transient WAV files. Empty means the system temp dir.
    pub scratch_dir: String,
}

impl AudioConfig {
    /// Resolve the scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        if self.scratch_dir.trim().is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&self.scratch_dir)
        }
    }
}

/// Chat transport limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum characters in a single outbound message.
    pub message_limit: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            message_limit: 4096,
        }
    }
}

/// Shape of the generated document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// What is being written, used inside the generation prompt.
    pub title: String,
    /// Ordered segment names; one generation call per entry.
    pub segments: Vec<String>,
    /// File name of the delivered document.
    pub file_name: String,
    /// Keep a failure marker under the heading of segments that failed.
    pub mark_failed_segments: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        let spec = DocumentSpec::default();
        Self {
            title: spec.title,
            segments: spec.segments,
            file_name: spec.file_name,
            mark_failed_segments: false,
        }
    }
}

impl DocumentConfig {
    /// Build the document spec described by this section.
    pub fn document_spec(&self) -> DocumentSpec {
        DocumentSpec {
            title: self.title.clone(),
            segments: self.segments.clone(),
            file_name: self.file_name.clone(),
        }
    }
}
