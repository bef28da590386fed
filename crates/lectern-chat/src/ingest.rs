//! Material ingestion: typed text and transcribed speech become `Material`s.

use lectern_audio::Transcoder;
use lectern_core::error::LecternError;
use lectern_core::types::{AudioFormat, Material, MaterialKind};
use lectern_whisper::{AudioUpload, TranscriptionService};

use crate::error::ChatError;

/// Any failure while turning audio into text is reported as a failed
/// transcription, including scratch-file I/O.
fn transcription_failure(err: LecternError) -> ChatError {
    match err {
        LecternError::Audio(msg) | LecternError::Transcription(msg) => {
            ChatError::Transcription(msg)
        }
        other => ChatError::Transcription(other.to_string()),
    }
}

/// Normalizes raw inputs into materials.
pub struct IngestionPipeline<S> {
    transcriber: S,
    transcoder: Transcoder,
    language: String,
}

impl<S: TranscriptionService> IngestionPipeline<S> {
    /// `language` is the hint passed with every transcription request.
    pub fn new(transcriber: S, transcoder: Transcoder, language: impl Into<String>) -> Self {
        Self {
            transcriber,
            transcoder,
            language: language.into(),
        }
    }

    pub fn transcriber(&self) -> &S {
        &self.transcriber
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Trim `raw` into a text material.
    pub fn ingest_text(&self, raw: &str) -> Result<Material, ChatError> {
        let content = raw.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyInput);
        }
        Ok(Material::new(MaterialKind::Text, content))
    }

    /// Transcribe an audio payload into a material of `kind`.
    ///
    /// Anything other than WAV is transcoded into a scratch file first. The
    /// scratch guard is held until transcription has finished and is dropped
    /// on every return path.
    pub async fn ingest_audio(
        &self,
        kind: MaterialKind,
        bytes: &[u8],
        format: AudioFormat,
    ) -> Result<Material, ChatError> {
        if bytes.is_empty() {
            return Err(ChatError::Transcription("empty audio payload".to_string()));
        }

        let (upload, _scratch) = if format.requires_transcoding() {
            let transcoder = self.transcoder.clone();
            let payload = bytes.to_vec();
            let scratch =
                tokio::task::spawn_blocking(move || transcoder.transcode(&payload, format))
                    .await
                    .map_err(|e| {
                        ChatError::Transcription(format!("transcoding task failed: {}", e))
                    })?
                    .map_err(transcription_failure)?;
            let wav = scratch.read_bytes().map_err(transcription_failure)?;
            (AudioUpload::wav(wav), Some(scratch))
        } else {
            (AudioUpload::wav(bytes.to_vec()), None)
        };

        tracing::debug!(
            kind = %kind,
            format = ?format,
            upload_bytes = upload.bytes.len(),
            "Transcribing material"
        );

        let result = self
            .transcriber
            .transcribe(&upload, &self.language)
            .await
            .map_err(transcription_failure)?;

        let text = result.text.trim();
        if text.is_empty() {
            return Err(ChatError::Transcription(
                "no speech was recognized".to_string(),
            ));
        }
        Ok(Material::new(kind, text))
    }
}
