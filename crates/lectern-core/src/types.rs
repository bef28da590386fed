use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Key of one conversation (a chat id on chat platforms).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Input stage of a conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No workflow in progress.
    #[default]
    Idle,
    /// Waiting for the main requirements text.
    AwaitingRequirements,
    /// Requirements stored; accepting materials or a generate request.
    CollectingMaterials,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "idle"),
            Stage::AwaitingRequirements => write!(f, "awaiting_requirements"),
            Stage::CollectingMaterials => write!(f, "collecting_materials"),
        }
    }
}

/// Origin of an ingested material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    /// Typed text, stored verbatim after trimming.
    Text,
    /// Voice note, stored as its transcription.
    Voice,
    /// Uploaded audio file, stored as its transcription.
    Audio,
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialKind::Text => write!(f, "text"),
            MaterialKind::Voice => write!(f, "voice"),
            MaterialKind::Audio => write!(f, "audio"),
        }
    }
}

/// Container/codec family of an inbound audio payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// Ogg container (voice notes).
    Ogg,
    Mp3,
    Wav,
    Flac,
    /// MPEG-4 audio (AAC).
    M4a,
    /// Anything else; the decoder probes the content.
    Unknown,
}

impl AudioFormat {
    /// Guess the format from a file extension (case-insensitive, dot optional).
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "ogg" | "oga" | "opus" => AudioFormat::Ogg,
            "mp3" => AudioFormat::Mp3,
            "wav" | "wave" => AudioFormat::Wav,
            "flac" => AudioFormat::Flac,
            "m4a" | "mp4" | "aac" => AudioFormat::M4a,
            _ => AudioFormat::Unknown,
        }
    }

    /// Guess the format from a MIME type such as `audio/mpeg`.
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "audio/ogg" | "audio/opus" | "application/ogg" => AudioFormat::Ogg,
            "audio/mpeg" | "audio/mp3" => AudioFormat::Mp3,
            "audio/wav" | "audio/x-wav" | "audio/wave" => AudioFormat::Wav,
            "audio/flac" | "audio/x-flac" => AudioFormat::Flac,
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => AudioFormat::M4a,
            _ => AudioFormat::Unknown,
        }
    }

    /// Canonical file extension, used as a decoder hint and upload file name.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::M4a => "m4a",
            AudioFormat::Unknown => "bin",
        }
    }

    /// MIME type reported when uploading the payload.
    pub fn mime(&self) -> &'static str {
        match self {
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Unknown => "application/octet-stream",
        }
    }

    /// Whether the payload must be decoded to WAV before transcription.
    pub fn requires_transcoding(&self) -> bool {
        !matches!(self, AudioFormat::Wav)
    }
}

/// Button choices offered to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    /// Start a fresh session, discarding any previous state.
    NewSession,
    /// Ask for instructions on adding another material.
    AddMaterial,
    /// Generate the document from what has been collected.
    Generate,
}

impl Choice {
    /// Human-readable button label.
    pub fn label(&self) -> &'static str {
        match self {
            Choice::NewSession => "Create a new script",
            Choice::AddMaterial => "Add materials",
            Choice::Generate => "Start generation",
        }
    }

    /// Stable identifier carried by button callbacks.
    pub fn callback_id(&self) -> &'static str {
        match self {
            Choice::NewSession => "new_scenario",
            Choice::AddMaterial => "add_materials",
            Choice::Generate => "generate_scenario",
        }
    }

    /// Parse a button callback identifier.
    pub fn from_callback_id(id: &str) -> Option<Self> {
        match id {
            "new_scenario" => Some(Choice::NewSession),
            "add_materials" => Some(Choice::AddMaterial),
            "generate_scenario" => Some(Choice::Generate),
            _ => None,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Inbound user event, already tagged with its session by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// The `/start` command.
    Start,
    /// A plain text message.
    Text(String),
    /// A voice note (always an Ogg payload).
    Voice(Vec<u8>),
    /// An uploaded audio file.
    Audio { bytes: Vec<u8>, format: AudioFormat },
    /// A button press.
    Button(Choice),
}

impl InboundEvent {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Start => "start",
            InboundEvent::Text(_) => "text",
            InboundEvent::Voice(_) => "voice",
            InboundEvent::Audio { .. } => "audio",
            InboundEvent::Button(_) => "button",
        }
    }
}

// =============================================================================
// Session data
// =============================================================================

/// One ingested unit of supplementary material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub kind: MaterialKind,
    /// Normalized text: trimmed input for text, transcription otherwise.
    pub content: String,
}

impl Material {
    pub fn new(kind: MaterialKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

/// Mutable state of one conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub stage: Stage,
    /// Main requirements; `Some` only with non-empty text.
    pub requirements: Option<String>,
    /// Materials in ingestion order.
    pub materials: Vec<Material>,
    /// When the current workflow started.
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Create an idle, empty session.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            stage: Stage::Idle,
            requirements: None,
            materials: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Drop requirements and materials and return to `Idle`.
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.requirements = None;
        self.materials.clear();
        self.started_at = Utc::now();
    }

    /// True when neither requirements nor materials are held.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_none() && self.materials.is_empty()
    }
}

// =============================================================================
// Document shape
// =============================================================================

/// Ordered segments the generator must produce, identical for every session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSpec {
    /// What is being written ("lecture script").
    pub title: String,
    /// Segment names in output order.
    pub segments: Vec<String>,
    /// File name of the delivered artifact.
    pub file_name: String,
}

impl Default for DocumentSpec {
    fn default() -> Self {
        Self {
            title: "lecture script".to_string(),
            segments: vec![
                "Introduction".to_string(),
                "Main part 1".to_string(),
                "Main part 2".to_string(),
                "Conclusion".to_string(),
                "Additional notes".to_string(),
            ],
            file_name: "lecture_script.md".to_string(),
        }
    }
}

impl DocumentSpec {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
