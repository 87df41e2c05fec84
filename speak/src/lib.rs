//! Text-to-speech playback engine
//!
//! Reads text aloud through the platform voice, the ElevenLabs API, or a
//! custom HTTP endpoint. Remote providers get one request per sentence, with
//! the next sentence fetched while the current one plays.

pub mod config;
pub mod error;
pub mod markup;
pub mod notify;
pub mod orchestrator;
pub mod player;
pub mod provider;
pub mod sequencer;
pub mod splitter;

#[cfg(test)]
mod test_support;

pub use config::{FileSettings, ProviderKind, SettingsSource, SpeakConfig};
pub use error::{Result, SpeakError};
pub use notify::{GENERIC_FAILURE, Notifier, StderrNotifier};
pub use orchestrator::{SpeechState, Speaker};
pub use player::{AudioSink, CommandPlayer, Playback};
pub use provider::{AudioArtifact, AudioProvider, ProviderConfig, SpeechSynthesizer, Voice};
pub use splitter::{SpeechUnit, SplitMode};
