//! On-device recognizer backed by Vosk models, one model directory per
//! course language. Enabled with the `vosk` feature.

use std::path::PathBuf;

use tracing::{debug, warn};
use vosk::{DecodingState, Model, Recognizer};

use coach_core::Lang;

use crate::asr::{AsrError, AsrHandlers, AsrState, SpeechRecognizer};

/// Where to find the unpacked model directories and the capture rate of
/// the PCM frames the caller feeds in.
#[derive(Debug, Clone)]
pub struct VoskConfig {
    pub model_dir_en: PathBuf,
    pub model_dir_es: PathBuf,
    pub sample_rate: f32,
}

impl VoskConfig {
    fn model_dir(&self, lang: Lang) -> &PathBuf {
        match lang {
            Lang::En => &self.model_dir_en,
            Lang::Es => &self.model_dir_es,
        }
    }
}

struct ActiveSession {
    recognizer: Recognizer,
    handlers: AsrHandlers,
    transcript: String,
}

/// Streaming recognizer fed PCM frames by the audio capture layer.
pub struct VoskRecognizer {
    config: VoskConfig,
    session: Option<ActiveSession>,
}

impl VoskRecognizer {
    #[must_use]
    pub fn new(config: VoskConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }
}

impl SpeechRecognizer for VoskRecognizer {
    fn start(&mut self, lang: Lang, mut handlers: AsrHandlers) -> AsrState {
        let dir = self.config.model_dir(lang);
        let Some(model) = Model::new(dir.display().to_string()) else {
            warn!(dir = %dir.display(), "vosk model failed to load");
            handlers.emit_error(&AsrError::Unavailable);
            return AsrState::Error;
        };

        let Some(recognizer) = Recognizer::new(&model, self.config.sample_rate) else {
            handlers.emit_error(&AsrError::Engine("recognizer init failed".into()));
            return AsrState::Error;
        };

        debug!(lang = lang.bcp47(), "vosk session opened");
        self.session = Some(ActiveSession {
            recognizer,
            handlers,
            transcript: String::new(),
        });
        AsrState::Listening
    }

    fn feed(&mut self, frame: &[i16]) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.recognizer.accept_waveform(frame) {
            Ok(DecodingState::Running) => {
                let partial = session.recognizer.partial_result().partial.to_owned();
                if !partial.is_empty() {
                    session.handlers.emit_result(&partial);
                }
            }
            Ok(DecodingState::Finalized) => {
                let text = session
                    .recognizer
                    .result()
                    .single()
                    .map(|r| r.text.to_owned())
                    .unwrap_or_default();
                if !text.is_empty() {
                    if !session.transcript.is_empty() {
                        session.transcript.push(' ');
                    }
                    session.transcript.push_str(&text);
                    let full = session.transcript.clone();
                    session.handlers.emit_result(&full);
                }
            }
            Ok(DecodingState::Failed) | Err(_) => {
                session
                    .handlers
                    .emit_error(&AsrError::Engine("decoding failed".into()));
            }
        }
    }

    fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        let tail = session
            .recognizer
            .final_result()
            .single()
            .map(|r| r.text.to_owned())
            .unwrap_or_default();
        if !tail.is_empty() {
            if !session.transcript.is_empty() {
                session.transcript.push(' ');
            }
            session.transcript.push_str(&tail);
            let full = session.transcript.clone();
            session.handlers.emit_result(&full);
        }

        if session.transcript.trim().is_empty() {
            session.handlers.emit_error(&AsrError::NoSpeech);
        }
        session.handlers.emit_end();
    }
}
