//! OpenAI-compatible transcription client (`POST {base}/audio/transcriptions`).

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use lectern_core::config::TranscriptionConfig;
use lectern_core::error::LecternError;

use crate::{AudioUpload, TranscriptionResult, TranscriptionService};

/// Transcription service backed by an OpenAI-style HTTP endpoint.
#[derive(Clone)]
pub struct HttpTranscriptionService {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for HttpTranscriptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTranscriptionService")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl HttpTranscriptionService {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LecternError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            LecternError::Transcription(format!("failed to build HTTP client: {}", e))
        })?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/audio/transcriptions",
                base_url.as_ref().trim_end_matches('/')
            ),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build from the `[transcription]` config section, reading the API key
    /// from the environment variable it names.
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, LecternError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            LecternError::Config(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(
            &config.base_url,
            api_key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl TranscriptionService for HttpTranscriptionService {
    async fn transcribe(
        &self,
        upload: &AudioUpload,
        language: &str,
    ) -> Result<TranscriptionResult, LecternError> {
        if upload.bytes.is_empty() {
            return Err(LecternError::Transcription(
                "Cannot transcribe empty audio data".to_string(),
            ));
        }

        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime)
            .map_err(|e| LecternError::Transcription(format!("invalid upload MIME type: {}", e)))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", language.to_string());

        tracing::info!(
            bytes = upload.bytes.len(),
            file_name = %upload.file_name,
            language,
            "Sending transcription request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| LecternError::Transcription(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|wrapper| wrapper.error.message)
                .unwrap_or(body);
            tracing::error!(status = status.as_u16(), error = %message, "Transcription API error");
            return Err(LecternError::Transcription(format!(
                "HTTP {}: {}",
                status.as_u16(),
                message
            )));
        }

        let parsed: TranscriptionResponse = response.json().await.map_err(|e| {
            LecternError::Transcription(format!("failed to parse transcription response: {}", e))
        })?;

        if parsed.text.trim().is_empty() {
            tracing::warn!("Transcription returned empty text");
        } else {
            tracing::info!(text_len = parsed.text.len(), "Transcription complete");
        }

        Ok(TranscriptionResult {
            text: parsed.text,
            language: language.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> HttpTranscriptionService {
        HttpTranscriptionService::new(
            format!("{}/v1/", server.uri()),
            "test-key",
            "whisper-1",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_transcribe_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_string_contains("whisper-1"))
            .and(body_string_contains("audio.wav"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "Привет, мир"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = service(&server)
            .transcribe(&AudioUpload::wav(vec![1; 64]), "ru")
            .await
            .unwrap();
        assert_eq!(result.text, "Привет, мир");
        assert_eq!(result.language, "ru");
    }

    #[tokio::test]
    async fn test_transcribe_sends_language_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(body_string_contains("name=\"language\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = service(&server)
            .transcribe(&AudioUpload::wav(vec![1; 8]), "ru")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_transcribe_http_error_carries_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Invalid API key"}})),
            )
            .mount(&server)
            .await;

        let err = service(&server)
            .transcribe(&AudioUpload::wav(vec![1; 8]), "ru")
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::Transcription(_)));
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_transcribe_missing_text_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let result = service(&server)
            .transcribe(&AudioUpload::wav(vec![1; 8]), "ru")
            .await
            .unwrap();
        assert!(result.text.is_empty());
    }

    #[tokio::test]
    async fn test_transcribe_empty_upload_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = service(&server)
            .transcribe(&AudioUpload::wav(Vec::new()), "ru")
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = TranscriptionConfig {
            api_key_env: "LECTERN_TEST_UNSET_TRANSCRIPTION_KEY".to_string(),
            ..TranscriptionConfig::default()
        };
        let err = HttpTranscriptionService::from_config(&config).unwrap_err();
        assert!(matches!(err, LecternError::Config(_)));
    }
}
