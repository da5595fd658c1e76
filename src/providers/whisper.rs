use super::{http_client, request_error, Transcriber};
use crate::config::TranscriberSettings;
use crate::error::{PressError, PressResult};
use crate::logger::{LogLevel, LOGGER};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const PROVIDER: &str = "whisper";

/// Response of an OpenAI-compatible transcription endpoint
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcriber for OpenAI-compatible `/audio/transcriptions` endpoints
///
/// Uploads the audio as multipart form data (`model`, `file`, optional
/// `language`) with bearer auth and reads the `text` field of the reply.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    language: Option<String>,
    timeout: Duration,
}

impl WhisperTranscriber {
    pub fn from_settings(settings: &TranscriberSettings) -> PressResult<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        Ok(Self {
            client: http_client(timeout)?,
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: settings.model.clone(),
            language: settings.language.clone().filter(|l| !l.trim().is_empty()),
            timeout,
        })
    }

    fn parse_response(body: &str) -> PressResult<String> {
        let response: TranscriptionResponse = serde_json::from_str(body).map_err(|e| {
            PressError::provider(PROVIDER, format!("Failed to parse API response: {}", e))
        })?;

        let text = response.text.trim();
        if text.is_empty() {
            return Err(PressError::EmptyResponse(PROVIDER.to_string()));
        }
        Ok(text.to_string())
    }
}

/// Content type for an audio file, by extension
pub fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some() && !self.api_url.trim().is_empty()
    }

    async fn transcribe(&self, audio: &Path) -> PressResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PressError::NotConfigured(PROVIDER.to_string()))?;

        let data = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        LOGGER.log(
            LogLevel::Debug,
            &format!(
                "Uploading {} ({} bytes) to {} with model {}",
                file_name,
                data.len(),
                self.api_url,
                self.model
            ),
            "providers::whisper",
        );

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str(mime_for(audio))
            .map_err(|e| PressError::provider(PROVIDER, e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, self.timeout, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(PROVIDER, self.timeout, e))?;

        if !status.is_success() {
            return Err(PressError::provider(
                PROVIDER,
                format!("API error ({}): {}", status, body.trim()),
            ));
        }

        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    fn settings(api_key: Option<&str>) -> TranscriberSettings {
        TranscriberSettings {
            api_key: api_key.map(str::to_string),
            ..TranscriberSettings::default()
        }
    }

    #[test]
    fn test_availability() {
        let available = |key: Option<&str>| {
            WhisperTranscriber::from_settings(&settings(key))
                .unwrap()
                .is_available()
        };
        assert!(!available(None));
        assert!(!available(Some(" ")));
        assert!(available(Some("sk-test")));
    }

    #[test]
    fn test_parse_response() {
        assert_eq!(
            WhisperTranscriber::parse_response(r#"{"text": "  hello there \n"}"#).unwrap(),
            "hello there"
        );
        assert!(matches!(
            WhisperTranscriber::parse_response(r#"{"text": "   "}"#),
            Err(PressError::EmptyResponse(_))
        ));
        assert!(matches!(
            WhisperTranscriber::parse_response("<html>bad gateway</html>"),
            Err(PressError::ProviderFailed { .. })
        ));
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("/tmp/a.WAV")), "audio/wav");
        assert_eq!(mime_for(Path::new("/tmp/a.mp3")), "audio/mpeg");
        assert_eq!(mime_for(Path::new("/tmp/noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_unconfigured_transcribe_is_rejected() {
        let transcriber = WhisperTranscriber::from_settings(&settings(None)).unwrap();
        let err = transcriber
            .transcribe(Path::new("/tmp/never-read.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, PressError::NotConfigured(_)));
    }

    fn audio_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, b"RIFF fake audio").unwrap();
        path
    }

    fn transcriber_for(api_url: String, timeout: Duration) -> WhisperTranscriber {
        WhisperTranscriber {
            client: http_client(timeout).unwrap(),
            api_url,
            api_key: Some("sk-test".to_string()),
            model: "whisper-1".to_string(),
            language: Some("en".to_string()),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_upload_returns_text() {
        let temp_dir = TempDir::new().unwrap();
        let mut server = Server::new_async().await;
        let _upload = server
            .mock("POST", "/v1/audio/transcriptions")
            .match_header("authorization", "Bearer sk-test")
            .match_header("content-type", Matcher::Regex("multipart/form-data".to_string()))
            .with_status(200)
            .with_body(r#"{"text": "welcome to the show"}"#)
            .create_async()
            .await;

        let transcriber = transcriber_for(
            format!("{}/v1/audio/transcriptions", server.url()),
            Duration::from_secs(5),
        );
        let text = transcriber.transcribe(&audio_file(&temp_dir)).await.unwrap();
        assert_eq!(text, "welcome to the show");
    }

    #[tokio::test]
    async fn test_server_error_is_provider_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut server = Server::new_async().await;
        let _upload = server
            .mock("POST", "/v1/audio/transcriptions")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let transcriber = transcriber_for(
            format!("{}/v1/audio/transcriptions", server.url()),
            Duration::from_secs(5),
        );
        let err = transcriber.transcribe(&audio_file(&temp_dir)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_stalled_endpoint_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let transcriber = transcriber_for(
            crate::providers::stalled_server().await,
            Duration::from_millis(200),
        );

        let err = transcriber.transcribe(&audio_file(&temp_dir)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimeoutError);
    }
}
