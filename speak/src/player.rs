// Local audio playback through an external player process

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempPath;
use tokio::process::{Child, Command};

use crate::config::PlayerSettings;
use crate::error::{Result, SpeakError};
use crate::provider::AudioArtifact;

/// Players tried in order when none is configured, with their quiet/no-window flags
const KNOWN_PLAYERS: &[(&str, &[&str])] = &[
    ("afplay", &[]),
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
    ("mpv", &["--no-video", "--really-quiet"]),
    ("mpg123", &["-q"]),
];

/// Something currently making sound.
///
/// Dropping the handle stops playback and releases whatever backs it.
#[async_trait]
pub trait Playback: Send {
    /// Wait until playback ends on its own
    async fn wait(&mut self) -> Result<()>;

    /// Stop playback immediately
    async fn stop(&mut self) -> Result<()>;
}

/// Plays audio artifacts
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Begin playing `artifact`. The returned handle owns its backing resource.
    async fn start(&self, artifact: AudioArtifact) -> Result<Box<dyn Playback>>;
}

/// A running player or speech process
pub struct ProcessPlayback {
    child: Child,
    label: String,
    /// Deleted when the playback is dropped
    audio_file: Option<TempPath>,
}

impl ProcessPlayback {
    pub fn new(child: Child, label: impl Into<String>, audio_file: Option<TempPath>) -> Self {
        Self {
            child,
            label: label.into(),
            audio_file,
        }
    }

    /// Temporary file being played, if the playback owns one
    pub fn audio_file(&self) -> Option<&Path> {
        self.audio_file.as_deref()
    }
}

#[async_trait]
impl Playback for ProcessPlayback {
    async fn wait(&mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| SpeakError::Playback(format!("Failed to wait for {}: {}", self.label, e)))?;

        if !status.success() {
            return Err(SpeakError::Playback(format!(
                "{} exited with status: {}",
                self.label, status
            )));
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        // Killing an already-exited child is not an error worth surfacing
        if let Err(e) = self.child.kill().await {
            log::debug!("Failed to stop {}: {}", self.label, e);
        }
        Ok(())
    }
}

/// Plays audio files with a command-line player (`afplay`, `ffplay`, `mpv`, ...)
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Find the first known player on PATH
    pub fn detect() -> Option<Self> {
        KNOWN_PLAYERS.iter().find_map(|(name, args)| {
            which::which(name)
                .ok()
                .map(|path| Self::new(path, args.iter().map(|a| a.to_string()).collect()))
        })
    }

    /// Use the configured player, or detect one
    pub fn from_settings(settings: &PlayerSettings) -> Option<Self> {
        match settings.command.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(command) => Some(Self::new(command, settings.args.clone())),
            None => Self::detect(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn label(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "player".to_string())
    }

    /// Write `artifact` to a temporary file and start the player on it
    pub async fn spawn(&self, artifact: &AudioArtifact) -> Result<ProcessPlayback> {
        let file = tempfile::Builder::new()
            .prefix("speak-")
            .suffix(&format!(".{}", artifact.extension()))
            .tempfile()
            .map_err(|e| SpeakError::Playback(format!("Failed to create audio file: {}", e)))?;
        let path = file.into_temp_path();

        tokio::fs::write(&path, &artifact.bytes)
            .await
            .map_err(|e| SpeakError::Playback(format!("Failed to write audio file: {}", e)))?;

        let label = self.label();
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&*path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeakError::Playback(format!("Failed to spawn {}: {}", label, e)))?;

        log::debug!("Playing {} bytes of {} with {}", artifact.len(), artifact.content_type, label);
        Ok(ProcessPlayback::new(child, label, Some(path)))
    }
}

#[async_trait]
impl AudioSink for CommandPlayer {
    async fn start(&self, artifact: AudioArtifact) -> Result<Box<dyn Playback>> {
        Ok(Box::new(self.spawn(&artifact).await?))
    }
}
