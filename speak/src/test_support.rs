// Scripted collaborators shared by the sequencer and orchestrator tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, SpeakError};
use crate::notify::Notifier;
use crate::player::{AudioSink, Playback};
use crate::provider::{AudioArtifact, AudioProvider, SpeechSynthesizer, Voice};

/// Units whose text contains this marker play until stopped
pub const HANG: &str = "[hang]";

/// Units whose text contains this marker are never fetched
pub const STALL: &str = "[stall]";

/// Shared, ordered record of what the fakes did
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == event).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Events starting with one of `prefixes`, in order
    pub fn filtered(&self, prefixes: &[&str]) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|e| prefixes.iter().any(|p| e.starts_with(p)))
            .cloned()
            .collect()
    }

    /// Poll until `event` has been recorded
    pub async fn wait_for(&self, event: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.position(event).is_none() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {:?}; saw {:?}",
                event,
                self.events()
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

/// Provider whose artifacts carry the unit text as their bytes
pub struct ScriptedProvider {
    log: EventLog,
    delay: Duration,
    failures: Mutex<HashMap<String, usize>>,
}

impl ScriptedProvider {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            delay: Duration::from_millis(1),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the next `times` fetches of `text`
    pub fn failing(self, text: &str, times: usize) -> Self {
        self.failures.lock().insert(text.to_string(), times);
        self
    }
}

#[async_trait]
impl AudioProvider for ScriptedProvider {
    async fn fetch(&self, text: &str) -> Result<AudioArtifact> {
        self.log.push(format!("fetch:{}", text));
        if text.contains(STALL) {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.delay).await;

        let should_fail = {
            let mut failures = self.failures.lock();
            match failures.get_mut(text) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            self.log.push(format!("failed:{}", text));
            return Err(SpeakError::Provider(format!("scripted failure for {}", text)));
        }

        self.log.push(format!("fetched:{}", text));
        Ok(AudioArtifact::new(text.as_bytes().to_vec(), "audio/mpeg"))
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }
}

/// Playback that lasts a fixed time, or forever for [`HANG`] text
pub struct RecordedPlayback {
    log: EventLog,
    text: String,
    duration: Duration,
}

#[async_trait]
impl Playback for RecordedPlayback {
    async fn wait(&mut self) -> Result<()> {
        if self.text.contains(HANG) {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.duration).await;
        self.log.push(format!("end:{}", self.text));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.log.push(format!("stop:{}", self.text));
        Ok(())
    }
}

impl Drop for RecordedPlayback {
    fn drop(&mut self) {
        self.log.push(format!("release:{}", self.text));
    }
}

pub struct RecordingSink {
    log: EventLog,
    duration: Duration,
}

impl RecordingSink {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            duration: Duration::from_millis(20),
        }
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn start(&self, artifact: AudioArtifact) -> Result<Box<dyn Playback>> {
        let text = String::from_utf8_lossy(&artifact.bytes).into_owned();
        self.log.push(format!("play:{}", text));
        Ok(Box::new(RecordedPlayback {
            log: self.log.clone(),
            text,
            duration: self.duration,
        }))
    }
}

/// System voice stand-in that records what it was asked to say
pub struct RecordingSynthesizer {
    log: EventLog,
    voices: Vec<Voice>,
    ssml: bool,
}

impl RecordingSynthesizer {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            voices: vec![Voice {
                id: "Samantha".into(),
                name: "Samantha".into(),
                language: Some("en_US".into()),
            }],
            ssml: false,
        }
    }

    pub fn with_ssml(mut self) -> Self {
        self.ssml = true;
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    async fn start(&self, text: &str, voice: Option<&str>) -> Result<Box<dyn Playback>> {
        self.log
            .push(format!("say:{}:{}", voice.unwrap_or("default"), text));
        Ok(Box::new(RecordedPlayback {
            log: self.log.clone(),
            text: text.to_string(),
            duration: Duration::from_millis(5),
        }))
    }

    async fn list_voices(&self) -> Result<Vec<Voice>> {
        Ok(self.voices.clone())
    }

    fn supports_ssml(&self) -> bool {
        self.ssml
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    messages: Mutex<Vec<String>>,
}

impl CountingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for CountingNotifier {
    fn notify_error(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
