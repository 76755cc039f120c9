use thiserror::Error;
use tracing::debug;

use coach_core::Lang;

/// Errors surfaced through the `on_error` callback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AsrError {
    /// The session ended without hearing anything. Shown to the user as
    /// its own message rather than a generic failure.
    #[error("no speech detected")]
    NoSpeech,

    #[error("speech recognition not available")]
    Unavailable,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("recognizer error: {0}")]
    Engine(String),
}

/// Session state reported by `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrState {
    Idle,
    Listening,
    Error,
}

/// Callbacks for one listening session. Interim and final transcripts both
/// arrive through `on_result`; `on_end` fires once when the session closes.
#[derive(Default)]
pub struct AsrHandlers {
    pub on_result: Option<Box<dyn FnMut(&str) + Send>>,
    pub on_end: Option<Box<dyn FnMut() + Send>>,
    pub on_error: Option<Box<dyn FnMut(&AsrError) + Send>>,
}

impl AsrHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_result(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_result = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_end(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_end = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl FnMut(&AsrError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn emit_result(&mut self, text: &str) {
        if let Some(f) = self.on_result.as_mut() {
            f(text);
        }
    }

    pub(crate) fn emit_end(&mut self) {
        if let Some(f) = self.on_end.as_mut() {
            f();
        }
    }

    pub(crate) fn emit_error(&mut self, err: &AsrError) {
        if let Some(f) = self.on_error.as_mut() {
            f(err);
        }
    }
}

/// Speech-to-text capability. One attempt per user-initiated `start`; no
/// automatic retry — retrying is pressing the button again.
pub trait SpeechRecognizer: Send {
    /// Opens a listening session. Transcripts stream through the handlers
    /// until `stop` or end-of-speech.
    fn start(&mut self, lang: Lang, handlers: AsrHandlers) -> AsrState;

    /// Pushes captured PCM samples into the active session.
    fn feed(&mut self, frame: &[i16]);

    /// Closes the session, flushing a final transcript if one exists.
    fn stop(&mut self);
}

/// Recognizer used when no ASR backend is available; every `start`
/// reports `Unavailable` so the UI can fall back to typed answers.
#[derive(Default)]
pub struct NullRecognizer;

impl NullRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SpeechRecognizer for NullRecognizer {
    fn start(&mut self, lang: Lang, mut handlers: AsrHandlers) -> AsrState {
        debug!(lang = lang.bcp47(), "asr (null): unavailable");
        handlers.emit_error(&AsrError::Unavailable);
        AsrState::Error
    }

    fn feed(&mut self, _frame: &[i16]) {}

    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn null_recognizer_reports_unavailable() {
        let saw_error = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&saw_error);

        let mut asr = NullRecognizer::new();
        let state = asr.start(
            Lang::En,
            AsrHandlers::new().on_error(move |err| {
                assert_eq!(*err, AsrError::Unavailable);
                flag.store(true, Ordering::SeqCst);
            }),
        );

        assert_eq!(state, AsrState::Error);
        assert!(saw_error.load(Ordering::SeqCst));
    }

    #[test]
    fn handlers_tolerate_missing_callbacks() {
        let mut handlers = AsrHandlers::new();
        handlers.emit_result("partial");
        handlers.emit_end();
        handlers.emit_error(&AsrError::NoSpeech);
    }
}
