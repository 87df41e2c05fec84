//! ElevenLabs text-to-speech provider
//!
//! One request per speech unit; the response body is the audio file.

use async_trait::async_trait;
use reqwest::{Client, Url};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use super::{AudioArtifact, AudioProvider, ElevenLabsConfig};
use crate::error::{Result, SpeakError};

const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

pub struct ElevenLabsProvider {
    client: Client,
    config: ElevenLabsConfig,
}

impl ElevenLabsProvider {
    pub fn new(client: Client, config: ElevenLabsConfig) -> Self {
        Self { client, config }
    }

    /// `{base_url}/v1/text-to-speech/{voice_id}` with the voice id escaped
    fn speech_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| {
            SpeakError::Configuration(format!("Invalid ElevenLabs base URL: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| SpeakError::Configuration("ElevenLabs base URL cannot take a path".into()))?
            .pop_if_empty()
            .extend(["v1", "text-to-speech", self.config.voice_id.as_str()]);
        Ok(url)
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[async_trait]
impl AudioProvider for ElevenLabsProvider {
    async fn fetch(&self, text: &str) -> Result<AudioArtifact> {
        let request = SpeechRequest {
            text,
            model_id: &self.config.model_id,
        };

        let response = self
            .client
            .post(self.speech_url()?)
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", DEFAULT_CONTENT_TYPE)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeakError::Provider(format!(
                "ElevenLabs returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("audio/"))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeakError::Provider("ElevenLabs returned empty audio".into()));
        }

        log::debug!("ElevenLabs produced {} bytes of {}", bytes.len(), content_type);
        Ok(AudioArtifact::new(bytes.to_vec(), content_type))
    }

    fn name(&self) -> &'static str {
        "ElevenLabs"
    }
}
