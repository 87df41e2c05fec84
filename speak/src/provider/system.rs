// Platform speech facility: macOS `say` or espeak-ng/espeak elsewhere

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{SpeechSynthesizer, Voice};
use crate::error::{Result, SpeakError};
use crate::player::{Playback, ProcessPlayback};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Say,
    Espeak,
}

/// Speaks text with the platform's command-line synthesizer
#[derive(Debug, Clone)]
pub struct SystemSynthesizer {
    engine: Engine,
    program: PathBuf,
}

impl SystemSynthesizer {
    /// Find `say`, `espeak-ng`, or `espeak` on PATH
    pub fn detect() -> Option<Self> {
        if let Ok(program) = which::which("say") {
            return Some(Self {
                engine: Engine::Say,
                program,
            });
        }
        ["espeak-ng", "espeak"].iter().find_map(|name| {
            which::which(name).ok().map(|program| Self {
                engine: Engine::Espeak,
                program,
            })
        })
    }

    /// Parse voice list output from `say -v ?`
    fn parse_say_voices(output: &str) -> Vec<Voice> {
        output
            .lines()
            .filter_map(|line| {
                // Format: "Name    language  # description"; names may contain spaces
                let (head, _) = line.split_once('#').unwrap_or((line, ""));
                let mut parts: Vec<&str> = head.split_whitespace().collect();
                let language = parts.pop()?;
                if parts.is_empty() {
                    return None;
                }
                let name = parts.join(" ");
                Some(Voice {
                    id: name.clone(),
                    name,
                    language: Some(language.to_string()),
                })
            })
            .collect()
    }

    /// Parse voice list output from `espeak-ng --voices`
    fn parse_espeak_voices(output: &str) -> Vec<Voice> {
        // Columns: Pty Language Age/Gender VoiceName File Other Languages
        output
            .lines()
            .skip(1)
            .filter_map(|line| {
                let cols: Vec<&str> = line.split_whitespace().collect();
                if cols.len() < 5 {
                    return None;
                }
                Some(Voice {
                    id: cols[1].to_string(),
                    name: cols[3].replace('_', " "),
                    language: Some(cols[1].to_string()),
                })
            })
            .collect()
    }

    fn command(&self, voice: Option<&str>, ssml: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.engine {
            Engine::Say => {
                if let Some(voice) = voice {
                    cmd.arg("-v").arg(voice);
                }
            }
            Engine::Espeak => {
                if let Some(voice) = voice {
                    cmd.arg("-v").arg(voice);
                }
                if ssml {
                    cmd.arg("-m");
                }
                cmd.arg("--stdin");
            }
        }
        cmd
    }
}

#[async_trait]
impl SpeechSynthesizer for SystemSynthesizer {
    async fn start(&self, text: &str, voice: Option<&str>) -> Result<Box<dyn Playback>> {
        let ssml = text.trim_start().starts_with("<speak");
        let mut cmd = self.command(voice, ssml);

        // Pass text via stdin to avoid argument escaping issues
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| SpeakError::Provider(format!("Failed to spawn {}: {}", self.name(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| SpeakError::Provider(format!("Failed to write to {}: {}", self.name(), e)))?;
        }

        Ok(Box::new(ProcessPlayback::new(child, self.name(), None)))
    }

    async fn list_voices(&self) -> Result<Vec<Voice>> {
        let args: &[&str] = match self.engine {
            Engine::Say => &["-v", "?"],
            Engine::Espeak => &["--voices"],
        };
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| SpeakError::Provider(format!("Failed to list voices: {}", e)))?;

        if !output.status.success() {
            return Err(SpeakError::Provider(format!(
                "{} voice listing failed with status: {}",
                self.name(),
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(match self.engine {
            Engine::Say => Self::parse_say_voices(&stdout),
            Engine::Espeak => Self::parse_espeak_voices(&stdout),
        })
    }

    fn supports_ssml(&self) -> bool {
        self.engine == Engine::Espeak
    }

    fn name(&self) -> &'static str {
        match self.engine {
            Engine::Say => "say",
            Engine::Espeak => "espeak",
        }
    }
}
