#![forbid(unsafe_code)]

//! Thin speech bridge: TTS and ASR capability traits with interchangeable
//! engines picked at startup by an availability probe.

pub mod asr;
pub mod synth;

#[cfg(feature = "vosk")]
pub mod vosk_asr;

pub use asr::{AsrError, AsrHandlers, AsrState, NullRecognizer, SpeechRecognizer};
pub use synth::{
    NullSynthesizer, PITCH_DEFAULT, RATE_NORMAL, RATE_SLOW, SpeakOptions, SpeakStep,
    SpeechSynthesizer, SystemSynthesizer, default_synthesizer, speak_queue,
};

#[cfg(feature = "vosk")]
pub use vosk_asr::VoskRecognizer;
