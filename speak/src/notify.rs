//! User-facing failure notifications

/// Message shown to the user when a session fails; the cause is only logged
pub const GENERIC_FAILURE: &str = "Something went wrong while trying to play the audio";

/// Receives one notification per failed `speak()` call
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Prints notifications to stderr
#[derive(Debug, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify_error(&self, message: &str) {
        eprintln!("Error: {}", message);
    }
}
