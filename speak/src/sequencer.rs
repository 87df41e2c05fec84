//! Ordered playback of speech units with one-ahead prefetch
//!
//! Unit 0 is fetched before anything plays. While unit `i` plays, unit
//! `i + 1` is fetched in a background task whose result sits in a single
//! prefetch slot until unit `i + 1` becomes current. At most two artifacts
//! exist at once: the one playing and the one prefetched.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SpeakError};
use crate::player::{AudioSink, Playback};
use crate::provider::{AudioArtifact, AudioProvider};
use crate::splitter::SpeechUnit;

/// Audio being fetched in the background for a later unit.
///
/// Dropping the slot aborts the fetch and discards its result unplayed.
struct Prefetch {
    index: usize,
    task: JoinHandle<Result<AudioArtifact>>,
}

impl Drop for Prefetch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Play `playback` until it ends or `cancel` fires, stopping it on cancellation
pub(crate) async fn play_to_end(
    playback: &mut dyn Playback,
    cancel: &CancellationToken,
) -> Result<()> {
    let finished = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = playback.wait() => Some(result),
    };

    match finished {
        Some(result) => result,
        None => {
            playback.stop().await?;
            Err(SpeakError::Cancelled)
        }
    }
}

pub struct PlaybackSequencer {
    provider: Arc<dyn AudioProvider>,
    sink: Arc<dyn AudioSink>,
    cancel: CancellationToken,
}

impl PlaybackSequencer {
    pub fn new(
        provider: Arc<dyn AudioProvider>,
        sink: Arc<dyn AudioSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            sink,
            cancel,
        }
    }

    /// Play every unit in index order.
    ///
    /// `on_started` runs once, after unit 0's audio is in hand and before it
    /// plays. Returns [`SpeakError::Cancelled`] if the token fires; any
    /// playing audio is stopped and any prefetched audio discarded.
    pub async fn run(&self, units: &[SpeechUnit], on_started: impl FnOnce() + Send) -> Result<()> {
        let Some(first) = units.first() else {
            return Ok(());
        };

        let mut current = Some(self.fetch(first).await?);
        on_started();

        let mut prefetched: Option<Prefetch> = None;
        for (position, unit) in units.iter().enumerate() {
            let artifact = match current.take() {
                Some(artifact) => artifact,
                None => self.take_prefetched(unit, prefetched.take()).await?,
            };

            if self.cancel.is_cancelled() {
                return Err(SpeakError::Cancelled);
            }

            log::debug!("Playing unit {} ({} bytes)", unit.index, artifact.len());
            let mut playback = self.sink.start(artifact).await?;

            // Playback of this unit has begun; start on the next one
            if let Some(next) = units.get(position + 1) {
                prefetched = Some(self.spawn_prefetch(next));
            }

            play_to_end(playback.as_mut(), &self.cancel).await?;
        }

        Ok(())
    }

    async fn fetch(&self, unit: &SpeechUnit) -> Result<AudioArtifact> {
        log::debug!("Fetching unit {} from {}", unit.index, self.provider.name());
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SpeakError::Cancelled),
            result = self.provider.fetch(&unit.text) => result,
        }
    }

    fn spawn_prefetch(&self, unit: &SpeechUnit) -> Prefetch {
        log::debug!("Prefetching unit {} from {}", unit.index, self.provider.name());
        let provider = Arc::clone(&self.provider);
        let text = unit.text.clone();
        Prefetch {
            index: unit.index,
            task: tokio::spawn(async move { provider.fetch(&text).await }),
        }
    }

    /// Use the prefetched audio for `unit`, fetching again if the prefetch failed
    async fn take_prefetched(
        &self,
        unit: &SpeechUnit,
        prefetched: Option<Prefetch>,
    ) -> Result<AudioArtifact> {
        if let Some(mut prefetch) = prefetched.filter(|p| p.index == unit.index) {
            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SpeakError::Cancelled),
                joined = &mut prefetch.task => joined,
            };

            match joined {
                Ok(Ok(artifact)) => return Ok(artifact),
                Ok(Err(e)) => {
                    log::warn!("Prefetch of unit {} failed, retrying: {}", unit.index, e)
                }
                Err(e) => log::warn!("Prefetch of unit {} did not finish: {}", unit.index, e),
            }
        }

        self.fetch(unit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::{SplitMode, speech_units};
    use crate::test_support::{EventLog, HANG, RecordingSink, ScriptedProvider};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn sequencer(provider: ScriptedProvider, log: &EventLog) -> (PlaybackSequencer, CancellationToken) {
        let cancel = CancellationToken::new();
        let sequencer = PlaybackSequencer::new(
            Arc::new(provider),
            Arc::new(RecordingSink::new(log.clone())),
            cancel.clone(),
        );
        (sequencer, cancel)
    }

    #[tokio::test]
    async fn test_units_play_strictly_in_order() {
        let log = EventLog::default();
        let (sequencer, _cancel) = sequencer(ScriptedProvider::new(log.clone()), &log);
        let units = speech_units("One. Two. Three.", SplitMode::Punctuation);

        sequencer.run(&units, || {}).await.unwrap();

        assert_eq!(
            log.filtered(&["play:", "end:"]),
            vec!["play:One.", "end:One.", "play:Two.", "end:Two.", "play:Three.", "end:Three."]
        );
    }

    #[tokio::test]
    async fn test_next_unit_is_prefetched_during_playback() {
        let log = EventLog::default();
        let (sequencer, _cancel) = sequencer(ScriptedProvider::new(log.clone()), &log);
        let units = speech_units("Hello world. How are you?", SplitMode::Punctuation);
        assert_eq!(units.len(), 2);

        sequencer.run(&units, || {}).await.unwrap();

        let play_first = log.position("play:Hello world.").unwrap();
        let fetch_second = log.position("fetch:How are you?").unwrap();
        let fetched_second = log.position("fetched:How are you?").unwrap();
        let end_first = log.position("end:Hello world.").unwrap();
        let play_second = log.position("play:How are you?").unwrap();

        assert!(play_first < fetch_second, "prefetch began before playback");
        assert!(fetched_second < end_first, "prefetch did not finish during playback");
        assert!(end_first < play_second);
        // The prefetched artifact was used; no second request
        assert_eq!(log.count("fetch:How are you?"), 1);
    }

    #[tokio::test]
    async fn test_failed_prefetch_falls_back_to_fresh_fetch() {
        let log = EventLog::default();
        let provider = ScriptedProvider::new(log.clone()).failing("Two.", 1);
        let (sequencer, _cancel) = sequencer(provider, &log);
        let units = speech_units("One. Two.", SplitMode::Punctuation);

        sequencer.run(&units, || {}).await.unwrap();

        assert_eq!(log.count("fetch:Two."), 2);
        assert_eq!(log.count("failed:Two."), 1);
        // The failure did not interrupt the unit that was playing
        assert!(log.position("failed:Two.").unwrap() < log.position("end:One.").unwrap());
        assert!(log.position("end:Two.").is_some());
    }

    #[tokio::test]
    async fn test_failed_prefetch_and_retry_fail_the_session() {
        let log = EventLog::default();
        let provider = ScriptedProvider::new(log.clone()).failing("Two.", 2);
        let (sequencer, _cancel) = sequencer(provider, &log);
        let units = speech_units("One. Two. Three.", SplitMode::Punctuation);

        let err = sequencer.run(&units, || {}).await.unwrap_err();

        assert!(matches!(err, SpeakError::Provider(_)));
        assert!(log.position("end:One.").is_some());
        assert!(log.position("play:Two.").is_none());
        assert!(log.position("fetch:Three.").is_none());
        assert_eq!(log.count_prefix("release:"), log.count_prefix("play:"));
    }

    #[tokio::test]
    async fn test_first_fetch_failure_never_starts() {
        let log = EventLog::default();
        let provider = ScriptedProvider::new(log.clone()).failing("One.", 1);
        let (sequencer, _cancel) = sequencer(provider, &log);
        let units = speech_units("One. Two.", SplitMode::Punctuation);
        let started = AtomicBool::new(false);

        let err = sequencer
            .run(&units, || started.store(true, Ordering::SeqCst))
            .await
            .unwrap_err();

        assert!(matches!(err, SpeakError::Provider(_)));
        assert!(!started.load(Ordering::SeqCst));
        assert_eq!(log.count_prefix("play:"), 0);
    }

    #[tokio::test]
    async fn test_no_units_is_a_no_op() {
        let log = EventLog::default();
        let (sequencer, _cancel) = sequencer(ScriptedProvider::new(log.clone()), &log);
        let started = AtomicBool::new(false);

        sequencer
            .run(&[], || started.store(true, Ordering::SeqCst))
            .await
            .unwrap();

        assert!(!started.load(Ordering::SeqCst));
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_and_releases_everything() {
        let log = EventLog::default();
        let (sequencer, cancel) = sequencer(ScriptedProvider::new(log.clone()), &log);
        let text = format!("Long one {}. Never played.", HANG);
        let units = speech_units(&text, SplitMode::Punctuation);
        let first = format!("Long one {}.", HANG);

        let run = sequencer.run(&units, || {});
        let watcher = async {
            log.wait_for(&format!("play:{}", first)).await;
            log.wait_for("fetched:Never played.").await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(run, watcher);

        assert!(matches!(result, Err(SpeakError::Cancelled)));
        assert!(log.position(&format!("stop:{}", first)).is_some());
        assert!(log.position(&format!("release:{}", first)).is_some());
        assert!(log.position("play:Never played.").is_none());
    }
}
