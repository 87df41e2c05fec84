//! Custom TTS endpoint provider
//!
//! Two requests per speech unit: the endpoint answers the synthesis request
//! with JSON naming an audio URL, and that URL serves the audio itself.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::{AudioArtifact, AudioProvider, CustomConfig};
use crate::error::{Result, SpeakError};

pub struct CustomEndpointProvider {
    client: Client,
    config: CustomConfig,
}

impl CustomEndpointProvider {
    pub fn new(client: Client, config: CustomConfig) -> Self {
        Self { client, config }
    }

    async fn request_audio_url(&self, text: &str) -> Result<Url> {
        let request = SynthesisRequest {
            input: text,
            model: self.config.model.as_deref(),
            voice: self.config.voice.as_deref(),
            speed: self.config.speed,
        };

        // Content-Type always wins over user-supplied headers
        let mut headers = self.config.headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeakError::Provider(format!(
                "Custom TTS endpoint returned {}",
                status
            )));
        }

        let body: SynthesisResponse = response.json().await.map_err(|e| {
            SpeakError::Provider(format!("Failed to parse custom TTS response: {}", e.without_url()))
        })?;

        let audio_url = [body.url, body.audio_url]
            .into_iter()
            .flatten()
            .find(|u| !u.trim().is_empty())
            .ok_or_else(|| SpeakError::Provider("No audio URL in custom TTS response".into()))?;

        Url::parse(audio_url.trim())
            .map_err(|e| SpeakError::Provider(format!("Invalid audio URL format: {}", e)))
    }

    async fn download(&self, url: Url) -> Result<AudioArtifact> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeakError::Provider(format!(
                "Failed to fetch audio data: {}",
                status
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .ok_or_else(|| SpeakError::Provider("Audio response has no content type".into()))?;

        if !content_type.to_lowercase().starts_with("audio/") {
            return Err(SpeakError::Provider(format!(
                "Invalid content type: {}",
                content_type
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeakError::Provider("Received empty audio data".into()));
        }

        Ok(AudioArtifact::new(bytes.to_vec(), content_type))
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
    speed: f32,
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    audio_url: Option<String>,
}

#[async_trait]
impl AudioProvider for CustomEndpointProvider {
    async fn fetch(&self, text: &str) -> Result<AudioArtifact> {
        let url = self.request_audio_url(text).await?;
        log::debug!("Custom TTS audio at {}", url.host_str().unwrap_or("<no host>"));
        self.download(url).await
    }

    fn name(&self) -> &'static str {
        "Custom"
    }
}
