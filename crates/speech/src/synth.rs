use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use coach_core::Lang;

/// Natural speaking rate.
pub const RATE_NORMAL: f32 = 1.0;
/// Slowed-down rate for imitation practice.
pub const RATE_SLOW: f32 = 0.5;
pub const PITCH_DEFAULT: f32 = 1.0;

const RATE_MIN: f32 = 0.5;
const RATE_MAX: f32 = 1.4;
const PITCH_MIN: f32 = 0.5;
const PITCH_MAX: f32 = 2.0;

const POLL_INTERVAL: Duration = Duration::from_millis(40);

/// Per-utterance options. Rate and pitch are multipliers around the
/// engine's natural values and get clamped to safe ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeakOptions {
    pub lang: Lang,
    pub rate: f32,
    pub pitch: f32,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            lang: Lang::En,
            rate: RATE_NORMAL,
            pitch: PITCH_DEFAULT,
        }
    }
}

impl SpeakOptions {
    #[must_use]
    pub fn for_lang(lang: Lang) -> Self {
        Self {
            lang,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn slow(lang: Lang) -> Self {
        Self {
            lang,
            rate: RATE_SLOW,
            pitch: PITCH_DEFAULT,
        }
    }

    fn clamped(self) -> Self {
        Self {
            lang: self.lang,
            rate: self.rate.clamp(RATE_MIN, RATE_MAX),
            pitch: self.pitch.clamp(PITCH_MIN, PITCH_MAX),
        }
    }
}

/// Text-to-speech capability.
///
/// `speak` blocks until the utterance finishes and never propagates an
/// engine failure: a failed utterance resolves immediately so a broken
/// audio stack degrades to a silent lesson instead of an error screen.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str, opts: SpeakOptions);

    /// Requests cancellation: stops current audio and marks the flag
    /// observed between queued segments.
    fn cancel(&self);

    fn is_speaking(&self) -> bool;

    fn cancel_requested(&self) -> bool;

    fn reset_cancel(&self);
}

/// Plays a queue of EN/ES segments with pauses, checking the cancel flag
/// between segments so a tap on "stop" ends the whole sequence.
pub fn speak_queue(synth: &dyn SpeechSynthesizer, steps: &[SpeakStep], default_gap: Duration) {
    synth.reset_cancel();
    for step in steps {
        if synth.cancel_requested() {
            break;
        }
        let opts = SpeakOptions {
            lang: step.lang.unwrap_or(Lang::En),
            rate: step.rate.unwrap_or(RATE_NORMAL),
            pitch: step.pitch.unwrap_or(PITCH_DEFAULT),
        };
        synth.speak(&step.text, opts);
        if synth.cancel_requested() {
            break;
        }
        let gap = step.pause.unwrap_or(default_gap);
        if !gap.is_zero() {
            thread::sleep(gap);
        }
    }
}

/// One segment of a spoken sequence.
#[derive(Debug, Clone, Default)]
pub struct SpeakStep {
    pub text: String,
    pub lang: Option<Lang>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub pause: Option<Duration>,
}

impl SpeakStep {
    #[must_use]
    pub fn new(text: impl Into<String>, lang: Lang) -> Self {
        Self {
            text: text.into(),
            lang: Some(lang),
            ..Self::default()
        }
    }
}

//
// ─── SYSTEM ENGINE ─────────────────────────────────────────────────────────────
//

/// Synthesizer over the platform speech API (via the `tts` crate).
pub struct SystemSynthesizer {
    engine: Mutex<tts::Tts>,
    speaking: AtomicBool,
    cancel: AtomicBool,
}

impl SystemSynthesizer {
    /// Probes the platform engine; `None` when no speech backend exists.
    #[must_use]
    pub fn try_new() -> Option<Self> {
        match tts::Tts::default() {
            Ok(engine) => Some(Self {
                engine: Mutex::new(engine),
                speaking: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
            }),
            Err(err) => {
                warn!(error = %err, "platform TTS unavailable");
                None
            }
        }
    }

    fn pick_voice(engine: &mut tts::Tts, lang: Lang) {
        let tag = lang.bcp47().to_lowercase();
        let Ok(voices) = engine.voices() else { return };
        let found = voices.iter().find(|v| {
            v.language()
                .to_string()
                .to_lowercase()
                .starts_with(&tag[..2])
        });
        if let Some(voice) = found {
            let _ = engine.set_voice(voice);
        }
    }
}

impl SpeechSynthesizer for SystemSynthesizer {
    fn speak(&self, text: &str, opts: SpeakOptions) {
        if text.is_empty() {
            return;
        }
        let opts = opts.clamped();

        // Only `reset_cancel` clears the flag; a cancel that lands just
        // before this call must still suppress the utterance.
        self.speaking.store(true, Ordering::SeqCst);

        let started = {
            let Ok(mut engine) = self.engine.lock() else {
                self.speaking.store(false, Ordering::SeqCst);
                return;
            };

            Self::pick_voice(&mut engine, opts.lang);

            let rate = (engine.normal_rate() * opts.rate)
                .clamp(engine.min_rate(), engine.max_rate());
            let _ = engine.set_rate(rate);
            let pitch = (engine.normal_pitch() * opts.pitch)
                .clamp(engine.min_pitch(), engine.max_pitch());
            let _ = engine.set_pitch(pitch);

            engine.speak(text, true).is_ok()
        };

        if !started {
            // Fail-silent policy: a broken engine resolves immediately.
            debug!("utterance failed to start, resolving silently");
            self.speaking.store(false, Ordering::SeqCst);
            return;
        }

        // Give the engine a moment to begin, then wait for completion.
        thread::sleep(POLL_INTERVAL);
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                if let Ok(mut engine) = self.engine.lock() {
                    let _ = engine.stop();
                }
                break;
            }
            let still_speaking = self
                .engine
                .lock()
                .ok()
                .and_then(|engine| engine.is_speaking().ok())
                .unwrap_or(false);
            if !still_speaking {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        self.speaking.store(false, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Ok(mut engine) = self.engine.lock() {
            let _ = engine.stop();
        }
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }
}

//
// ─── NULL ENGINE ───────────────────────────────────────────────────────────────
//

/// No-op synthesizer for headless environments; logs the text and resolves.
#[derive(Default)]
pub struct NullSynthesizer {
    cancel: AtomicBool,
}

impl NullSynthesizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpeechSynthesizer for NullSynthesizer {
    fn speak(&self, text: &str, opts: SpeakOptions) {
        debug!(lang = opts.lang.bcp47(), "tts (null): {text}");
    }

    fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        false
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }
}

/// Startup selection: the platform engine when available, otherwise null.
#[must_use]
pub fn default_synthesizer() -> Box<dyn SpeechSynthesizer> {
    match SystemSynthesizer::try_new() {
        Some(system) => Box::new(system),
        None => {
            warn!("no platform speech engine, using silent synthesizer");
            Box::new(NullSynthesizer::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_clamp_to_safe_ranges() {
        let opts = SpeakOptions {
            lang: Lang::Es,
            rate: 9.0,
            pitch: 0.0,
        }
        .clamped();
        assert!((opts.rate - RATE_MAX).abs() < f32::EPSILON);
        assert!((opts.pitch - PITCH_MIN).abs() < f32::EPSILON);
    }

    #[test]
    fn null_synthesizer_resolves_immediately() {
        let synth = NullSynthesizer::new();
        synth.speak("License and registration please", SpeakOptions::default());
        assert!(!synth.is_speaking());
    }

    struct RecordingSynth {
        spoken: Mutex<Vec<String>>,
        cancel: AtomicBool,
        cancel_while_speaking: bool,
    }

    impl RecordingSynth {
        fn new(cancel_while_speaking: bool) -> Self {
            Self {
                spoken: Mutex::new(Vec::new()),
                cancel: AtomicBool::new(false),
                cancel_while_speaking,
            }
        }
    }

    impl SpeechSynthesizer for RecordingSynth {
        fn speak(&self, text: &str, _opts: SpeakOptions) {
            self.spoken.lock().unwrap().push(text.to_owned());
            if self.cancel_while_speaking {
                self.cancel.store(true, Ordering::SeqCst);
            }
        }

        fn cancel(&self) {
            self.cancel.store(true, Ordering::SeqCst);
        }

        fn is_speaking(&self) -> bool {
            false
        }

        fn cancel_requested(&self) -> bool {
            self.cancel.load(Ordering::SeqCst)
        }

        fn reset_cancel(&self) {
            self.cancel.store(false, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancel_during_a_segment_stops_the_rest_of_the_queue() {
        // The flag set while a segment plays must survive into the next
        // queue check; speaking again may not clear it.
        let synth = RecordingSynth::new(true);
        speak_queue(
            &synth,
            &[SpeakStep::new("one", Lang::En), SpeakStep::new("two", Lang::Es)],
            Duration::ZERO,
        );
        assert_eq!(synth.spoken.lock().unwrap().as_slice(), ["one"]);
    }

    #[test]
    fn queue_stops_at_cancel_flag() {
        let synth = NullSynthesizer::new();
        synth.cancel();
        assert!(synth.cancel_requested());

        // Starting a new queue clears any stale cancellation first.
        speak_queue(
            &synth,
            &[SpeakStep::new("one", Lang::En), SpeakStep::new("two", Lang::Es)],
            Duration::ZERO,
        );
        assert!(!synth.cancel_requested());
    }
}
