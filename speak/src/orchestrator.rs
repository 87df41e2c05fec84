//! Speech sessions: provider selection, state, cancellation
//!
//! A [`Speaker`] owns at most one playback session at a time. Each `speak()`
//! call reads the settings once, validates them into a [`ProviderConfig`],
//! and then either hands the whole text to the system voice or splits it
//! into units for the [`PlaybackSequencer`]. Starting a new session cancels
//! the current one and waits for it to finish releasing its audio first.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::SettingsSource;
use crate::error::{Result, SpeakError};
use crate::markup::markdown_to_ssml;
use crate::notify::{GENERIC_FAILURE, Notifier, StderrNotifier};
use crate::player::AudioSink;
use crate::provider::{HttpProviderFactory, ProviderConfig, ProviderFactory, SpeechSynthesizer};
use crate::sequencer::{PlaybackSequencer, play_to_end};
use crate::splitter::speech_units;

/// Observable speaking state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechState {
    Idle,
    /// Reading settings and fetching the first audio
    Preparing,
    /// Audio is playing
    Speaking,
    /// A cancel was requested and the session is releasing its audio
    Cancelling,
}

struct SessionHandle {
    id: u64,
    cancel: CancellationToken,
    /// Fired once the session has released everything it held
    done: CancellationToken,
}

/// Clears the session slot when a session ends, however it ends
struct ActiveSession<'a> {
    speaker: &'a Speaker,
    id: u64,
    cancel: CancellationToken,
    done: CancellationToken,
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        self.speaker.finish_session(self.id);
        self.done.cancel();
    }
}

pub struct Speaker {
    settings: Arc<dyn SettingsSource>,
    providers: Arc<dyn ProviderFactory>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    sink: Option<Arc<dyn AudioSink>>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<SpeechState>,
    session: Mutex<Option<SessionHandle>>,
    /// Serializes session hand-over between overlapping `speak()` calls
    switch: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

impl Speaker {
    pub fn new(settings: Arc<dyn SettingsSource>) -> Self {
        let (state, _) = watch::channel(SpeechState::Idle);
        Self {
            settings,
            providers: Arc::new(HttpProviderFactory),
            synthesizer: None,
            sink: None,
            notifier: Arc::new(StderrNotifier),
            state,
            session: Mutex::new(None),
            switch: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Platform voice used when the system provider is selected
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Where remote providers' audio is played
    pub fn with_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_providers(mut self, providers: Arc<dyn ProviderFactory>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn state(&self) -> SpeechState {
        *self.state.borrow()
    }

    /// True while a session is preparing or playing audio
    pub fn is_speaking(&self) -> bool {
        matches!(self.state(), SpeechState::Preparing | SpeechState::Speaking)
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<SpeechState> {
        self.state.subscribe()
    }

    /// Speak `text`, replacing any session already in progress.
    ///
    /// Any failure other than cancellation is logged and reported to the
    /// notifier exactly once with a generic message, then returned.
    pub async fn speak(&self, text: &str) -> Result<()> {
        let session = self.begin_session().await;
        let result = self.run_session(text, &session).await;
        drop(session);

        match &result {
            Ok(()) => log::debug!("Speech finished"),
            Err(e) if e.is_failure() => {
                log::error!("Speech failed: {}", e);
                self.notifier.notify_error(GENERIC_FAILURE);
            }
            Err(_) => log::debug!("Speech cancelled"),
        }
        result
    }

    /// Stop the current session, if any. Calling this again, or while idle,
    /// does nothing.
    pub fn cancel(&self) {
        let session = self.session.lock();
        match session.as_ref() {
            Some(handle) if !handle.cancel.is_cancelled() => {
                log::debug!("Cancelling session {}", handle.id);
                handle.cancel.cancel();
                self.state.send_replace(SpeechState::Cancelling);
            }
            _ => log::debug!("Nothing to cancel"),
        }
    }

    async fn begin_session(&self) -> ActiveSession<'_> {
        let _switch = self.switch.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let prior = {
            let mut slot = self.session.lock();
            let prior = slot.replace(SessionHandle {
                id,
                cancel: cancel.clone(),
                done: done.clone(),
            });
            if let Some(prior) = &prior {
                prior.cancel.cancel();
                self.state.send_replace(SpeechState::Cancelling);
            }
            prior
        };
        let session = ActiveSession {
            speaker: self,
            id,
            cancel,
            done,
        };

        if let Some(prior) = prior {
            log::debug!("Waiting for session {} to stop before starting {}", prior.id, id);
            prior.done.cancelled().await;
        }

        self.set_state(id, SpeechState::Preparing);
        session
    }

    /// Publish `state` if session `id` is still current and not cancelled
    fn set_state(&self, id: u64, state: SpeechState) {
        let session = self.session.lock();
        if let Some(handle) = session.as_ref() {
            if handle.id == id && !handle.cancel.is_cancelled() {
                self.state.send_replace(state);
            }
        }
    }

    fn finish_session(&self, id: u64) {
        let mut session = self.session.lock();
        if session.as_ref().is_some_and(|handle| handle.id == id) {
            *session = None;
            self.state.send_replace(SpeechState::Idle);
        }
    }

    async fn run_session(&self, text: &str, session: &ActiveSession<'_>) -> Result<()> {
        let cancel = &session.cancel;
        let settings = unless_cancelled(cancel, self.settings.load()).await?;

        if !settings.enabled {
            log::info!("Speech is disabled in settings");
            return Ok(());
        }

        let provider = ProviderConfig::from_settings(&settings)?;
        log::debug!("Session {} using {} provider", session.id, provider.kind());

        if text.trim().is_empty() {
            log::debug!("Nothing to say");
            return Ok(());
        }

        match provider {
            ProviderConfig::System { voice, markup } => {
                self.speak_with_system(text, voice.as_deref(), markup, session)
                    .await
            }
            remote => {
                let sink = self.sink.clone().ok_or_else(|| {
                    SpeakError::Playback("No audio player available".into())
                })?;

                let units = speech_units(text, settings.splitting);
                if units.is_empty() {
                    return Ok(());
                }
                log::debug!("Split text into {} units", units.len());

                let audio = self.providers.create(&remote, settings.fetch_timeout())?;
                let sequencer = PlaybackSequencer::new(audio, sink, cancel.clone());
                sequencer
                    .run(&units, || self.set_state(session.id, SpeechState::Speaking))
                    .await
            }
        }
    }

    async fn speak_with_system(
        &self,
        text: &str,
        voice: Option<&str>,
        markup: bool,
        session: &ActiveSession<'_>,
    ) -> Result<()> {
        let cancel = &session.cancel;
        let synthesizer = self
            .synthesizer
            .clone()
            .ok_or_else(|| SpeakError::Provider("No system speech synthesizer found".into()))?;

        let utterance = if markup && synthesizer.supports_ssml() {
            markdown_to_ssml(text)
        } else {
            if markup {
                log::debug!("{} does not accept SSML, speaking plain text", synthesizer.name());
            }
            text.to_string()
        };

        let voice = match voice {
            Some(wanted) => unless_cancelled(cancel, resolve_voice(synthesizer.as_ref(), wanted)).await?,
            None => None,
        };

        let mut playback =
            unless_cancelled(cancel, synthesizer.start(&utterance, voice.as_deref())).await?;
        self.set_state(session.id, SpeechState::Speaking);
        play_to_end(playback.as_mut(), cancel).await
    }
}

/// Match `wanted` against the platform voices by id or name.
///
/// A voice the platform doesn't offer falls back to the default voice.
async fn resolve_voice(synthesizer: &dyn SpeechSynthesizer, wanted: &str) -> Result<Option<String>> {
    match synthesizer.list_voices().await {
        Ok(voices) => {
            let found = voices.into_iter().find(|v| {
                v.id.eq_ignore_ascii_case(wanted) || v.name.eq_ignore_ascii_case(wanted)
            });
            if found.is_none() {
                log::warn!("Voice '{}' not available, using the default voice", wanted);
            }
            Ok(found.map(|v| v.id))
        }
        Err(e) => {
            log::warn!("Could not list voices ({}), using the default voice", e);
            Ok(None)
        }
    }
}

async fn unless_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SpeakError::Cancelled),
        result = work => result,
    }
}
