//! Speech provider adapters
//!
//! Remote providers turn one speech unit into one [`AudioArtifact`]; the
//! system provider speaks whole utterances through the platform voice and
//! produces no artifact at all.

pub mod custom;
pub mod elevenlabs;
pub mod system;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ProviderKind, SpeakConfig, non_empty};
use crate::error::{Result, SpeakError};
use crate::player::Playback;

pub use custom::CustomEndpointProvider;
pub use elevenlabs::ElevenLabsProvider;
pub use system::SystemSynthesizer;

/// Audio bytes for exactly one speech unit
#[derive(Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    /// MIME type reported by the provider, e.g. `audio/mpeg`
    pub content_type: String,
}

impl fmt::Debug for AudioArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioArtifact")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl AudioArtifact {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension players expect for this content type
    pub fn extension(&self) -> &'static str {
        let mime = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        match mime.as_str() {
            "audio/wav" | "audio/wave" | "audio/x-wav" => "wav",
            "audio/flac" => "flac",
            "audio/ogg" | "audio/opus" => "ogg",
            "audio/mp4" | "audio/m4a" | "audio/aac" => "m4a",
            "audio/webm" => "webm",
            "audio/aiff" | "audio/x-aiff" => "aiff",
            // ElevenLabs and most TTS APIs default to MP3
            _ => "mp3",
        }
    }
}

/// Produces audio for a single speech unit
#[async_trait]
pub trait AudioProvider: Send + Sync {
    async fn fetch(&self, text: &str) -> Result<AudioArtifact>;

    fn name(&self) -> &'static str;
}

/// A voice offered by the platform speech facility
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub id: String,
    pub name: String,
    /// Language/locale (e.g., "en_US")
    pub language: Option<String>,
}

/// The platform speech facility.
///
/// Takes whole utterances; starting speech and "fetching audio" are the same
/// operation, so it hands back a playback handle directly.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Begin speaking `text`. `None` uses the platform default voice.
    async fn start(&self, text: &str, voice: Option<&str>) -> Result<Box<dyn Playback>>;

    async fn list_voices(&self) -> Result<Vec<Voice>>;

    /// Whether the facility understands SSML input
    fn supports_ssml(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

/// Validated ElevenLabs settings
#[derive(Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub model_id: String,
    pub voice_id: String,
    pub base_url: String,
}

impl fmt::Debug for ElevenLabsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsConfig")
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("voice_id", &self.voice_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Validated custom endpoint settings
#[derive(Clone)]
pub struct CustomConfig {
    pub endpoint: Url,
    pub headers: HeaderMap,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub speed: f32,
}

impl fmt::Debug for CustomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.keys().map(HeaderName::as_str).collect();
        f.debug_struct("CustomConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("headers", &header_names)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("speed", &self.speed)
            .finish()
    }
}

/// The provider chosen for one session, validated up front
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    System { voice: Option<String>, markup: bool },
    ElevenLabs(ElevenLabsConfig),
    Custom(CustomConfig),
}

impl ProviderConfig {
    /// Validate the settings snapshot for the configured provider.
    ///
    /// Only the selected provider's settings are checked; missing required
    /// fields fail with [`SpeakError::Configuration`].
    pub fn from_settings(config: &SpeakConfig) -> Result<Self> {
        match config.provider {
            ProviderKind::System => Ok(ProviderConfig::System {
                voice: non_empty(config.voice.as_deref()).map(str::to_string),
                markup: config.markup,
            }),
            ProviderKind::ElevenLabs => {
                let settings = &config.elevenlabs;
                let api_key = settings.resolve_api_key().ok_or_else(|| {
                    SpeakError::Configuration(format!(
                        "Missing ElevenLabs API key (set elevenlabs.api_key or {})",
                        settings.api_key_env
                    ))
                })?;
                let model_id = non_empty(settings.model.as_deref())
                    .ok_or_else(|| SpeakError::Configuration("Missing ElevenLabs model".into()))?;
                let voice_id = non_empty(settings.voice_id.as_deref())
                    .ok_or_else(|| SpeakError::Configuration("Missing ElevenLabs voice id".into()))?;

                Ok(ProviderConfig::ElevenLabs(ElevenLabsConfig {
                    api_key,
                    model_id: model_id.to_string(),
                    voice_id: voice_id.to_string(),
                    base_url: settings.base_url.trim_end_matches('/').to_string(),
                }))
            }
            ProviderKind::Custom => {
                let settings = &config.custom;
                let endpoint = non_empty(settings.endpoint.as_deref()).ok_or_else(|| {
                    SpeakError::Configuration("Missing custom TTS endpoint".into())
                })?;
                let endpoint = Url::parse(endpoint).map_err(|e| {
                    SpeakError::Configuration(format!("Invalid custom TTS endpoint: {}", e))
                })?;

                let mut headers = HeaderMap::new();
                for (name, value) in &settings.headers {
                    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                        SpeakError::Configuration(format!("Invalid header name: {}", name))
                    })?;
                    let header_value = HeaderValue::from_str(value).map_err(|_| {
                        SpeakError::Configuration(format!("Invalid value for header {}", name))
                    })?;
                    headers.insert(header_name, header_value);
                }

                Ok(ProviderConfig::Custom(CustomConfig {
                    endpoint,
                    headers,
                    model: non_empty(settings.model.as_deref()).map(str::to_string),
                    voice: non_empty(settings.voice.as_deref()).map(str::to_string),
                    speed: settings.speed,
                }))
            }
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::System { .. } => ProviderKind::System,
            ProviderConfig::ElevenLabs(_) => ProviderKind::ElevenLabs,
            ProviderConfig::Custom(_) => ProviderKind::Custom,
        }
    }
}

/// Builds the remote provider for a session
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &ProviderConfig, timeout: Duration) -> Result<Arc<dyn AudioProvider>>;
}

/// Creates HTTP-backed providers sharing one client per session
#[derive(Debug, Default)]
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, config: &ProviderConfig, timeout: Duration) -> Result<Arc<dyn AudioProvider>> {
        let client = Client::builder().timeout(timeout).build()?;
        match config {
            ProviderConfig::ElevenLabs(settings) => {
                Ok(Arc::new(ElevenLabsProvider::new(client, settings.clone())))
            }
            ProviderConfig::Custom(settings) => {
                Ok(Arc::new(CustomEndpointProvider::new(client, settings.clone())))
            }
            ProviderConfig::System { .. } => Err(SpeakError::Configuration(
                "The system voice does not produce audio files".into(),
            )),
        }
    }
}
