//! Speech recognition via external APIs.
//!
//! The recognizer is an opaque capability: it takes a WAV file and either
//! returns a transcript, reports that it heard no intelligible speech, or
//! fails. Only the last case is an error.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::MediaError;

/// Outcome of a recognition attempt that reached the recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// Recognized speech.
    Speech(String),
    /// The audio was processed but no speech could be understood.
    NotUnderstood,
}

impl Recognition {
    /// Classify a raw transcript; blank text means nothing was understood.
    pub fn from_transcript(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            Self::NotUnderstood
        } else {
            Self::Speech(text.to_string())
        }
    }
}

/// Trait for speech recognizers.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize speech in a 16-bit PCM WAV file.
    async fn recognize(&self, wav_path: &Path) -> Result<Recognition, MediaError>;

    /// Get the recognizer name.
    fn name(&self) -> &str;
}

/// OpenAI Whisper-compatible recognizer.
///
/// The API key is optional so self-hosted endpoints without auth work.
pub struct WhisperRecognizer {
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    language: Option<String>,
    client: reqwest::Client,
}

impl WhisperRecognizer {
    /// Create a new Whisper recognizer.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            language: None,
            client,
        }
    }

    /// Set the bearer token sent with each request.
    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Use a custom base URL (for OpenAI-compatible endpoints).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a language hint (ISO 639-1).
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    async fn recognize(&self, wav_path: &Path) -> Result<Recognition, MediaError> {
        let data = tokio::fs::read(wav_path).await?;

        let file_part = reqwest::multipart::Part::bytes(data)
            .file_name("voice.wav")
            .mime_str("audio/wav")
            .map_err(|e| MediaError::Recognition {
                reason: format!("Failed to create multipart: {}", e),
            })?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        if let Some(lang) = &self.language {
            form = form.text("language", lang.clone());
        }

        let mut request = self.client.post(self.endpoint()).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| MediaError::Recognition {
                reason: format!("HTTP request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Recognition {
                reason: format!("Whisper API returned {}: {}", status, body),
            });
        }

        let result: WhisperResponse =
            response
                .json()
                .await
                .map_err(|e| MediaError::Recognition {
                    reason: format!("Failed to parse response: {}", e),
                })?;

        Ok(Recognition::from_transcript(&result.text))
    }

    fn name(&self) -> &str {
        "whisper"
    }
}

impl Default for WhisperRecognizer {
    fn default() -> Self {
        Self::new()
    }
}
