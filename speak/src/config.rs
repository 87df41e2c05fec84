// speak configuration management

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SpeakError};
use crate::splitter::SplitMode;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_ELEVENLABS_KEY_ENV: &str = "ELEVENLABS_API_KEY";

/// Which backend turns text into speech
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The platform speech facility (`say`, `espeak-ng`, ...)
    #[default]
    System,
    /// ElevenLabs text-to-speech API, one audio file per sentence
    ElevenLabs,
    /// A user-configured HTTP endpoint that returns an audio URL
    Custom,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::System => "system",
            ProviderKind::ElevenLabs => "elevenlabs",
            ProviderKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" | "browser" | "native" => Ok(ProviderKind::System),
            "elevenlabs" | "eleven-labs" | "eleven_labs" => Ok(ProviderKind::ElevenLabs),
            "custom" => Ok(ProviderKind::Custom),
            _ => Err(format!(
                "Unknown TTS provider: {}. Available: system, elevenlabs, custom",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevenLabsSettings {
    /// API key stored in the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset
    #[serde(default = "default_elevenlabs_key_env")]
    pub api_key_env: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    #[serde(default = "default_elevenlabs_url")]
    pub base_url: String,
}

fn default_elevenlabs_key_env() -> String {
    DEFAULT_ELEVENLABS_KEY_ENV.to_string()
}

fn default_elevenlabs_url() -> String {
    DEFAULT_ELEVENLABS_URL.to_string()
}

impl Default for ElevenLabsSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_elevenlabs_key_env(),
            model: None,
            voice_id: None,
            base_url: default_elevenlabs_url(),
        }
    }
}

impl ElevenLabsSettings {
    /// API key from the config file, falling back to the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        non_empty(self.api_key.as_deref())
            .map(str::to_string)
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Extra request headers, e.g. `Authorization`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for CustomSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            headers: BTreeMap::new(),
            model: None,
            voice: None,
            speed: default_speed(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Player program; detected from PATH when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments placed before the audio file path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakConfig {
    /// Whether speech is enabled at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub provider: ProviderKind,

    /// System voice name (None uses the platform default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Convert markdown to SSML before handing it to the system voice
    #[serde(default)]
    pub markup: bool,

    #[serde(default)]
    pub splitting: SplitMode,

    /// Upper bound on a single audio fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub elevenlabs: ElevenLabsSettings,

    #[serde(default)]
    pub custom: CustomSettings,

    #[serde(default)]
    pub player: PlayerSettings,
}

fn default_enabled() -> bool {
    true
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl Default for SpeakConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: ProviderKind::default(),
            voice: None,
            markup: false,
            splitting: SplitMode::default(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            elevenlabs: ElevenLabsSettings::default(),
            custom: CustomSettings::default(),
            player: PlayerSettings::default(),
        }
    }
}

impl SpeakConfig {
    /// Get the config directory path.
    ///
    /// Can be overridden via the `SPEAK_CONFIG_DIR` environment variable.
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(override_dir) = std::env::var("SPEAK_CONFIG_DIR") {
            return Ok(PathBuf::from(override_dir));
        }
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| SpeakError::Configuration("Could not determine home directory".into()))?;
        Ok(PathBuf::from(home).join(".config").join("cli-programs"))
    }

    /// Get the config file path: ~/.config/cli-programs/speak.toml
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("speak.toml"))
    }

    /// Load config from the default path, returning defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            SpeakError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SpeakError::Configuration(format!("Invalid config file: {}", e)))
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SpeakError::Configuration(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SpeakError::Configuration(format!("Failed to serialize config: {}", e)))?;
        fs::write(&path, content).map_err(|e| {
            SpeakError::Configuration(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

/// Trim a setting and treat empty values as unset
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Where a session reads its settings from.
///
/// Read once at the start of every `speak()` call; the returned value is the
/// snapshot the whole session runs against.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn load(&self) -> Result<SpeakConfig>;
}

/// Settings persisted in a TOML file
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Settings at ~/.config/cli-programs/speak.toml
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(SpeakConfig::config_path()?))
    }
}

#[async_trait]
impl SettingsSource for FileSettings {
    async fn load(&self) -> Result<SpeakConfig> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => SpeakConfig::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SpeakConfig::default()),
            Err(e) => Err(SpeakError::Configuration(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl SettingsSource for SpeakConfig {
    async fn load(&self) -> Result<SpeakConfig> {
        Ok(self.clone())
    }
}
