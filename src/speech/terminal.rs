//! Terminal speech backends
//!
//! Stand-ins for platform speech engines when running in a terminal:
//! - [`LineRecognizer`] treats a typed line as the recognized utterance
//! - [`PacedSynthesizer`] "plays" a reply for as long as reading it aloud
//!   would take, so barge-in and cancellation behave like the real thing

use crate::controller::ControllerEvent;
use crate::speech::capture::{Recognizer, RecognizerSignal, SessionId};
use crate::speech::output::{SynthesisSignal, Synthesizer, UtteranceId, VoiceSettings};
use crate::Result;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Recognizer fed from typed lines
pub struct LineRecognizer {
    active: Arc<Mutex<Option<SessionId>>>,
}

/// Input side of a [`LineRecognizer`]
#[derive(Clone)]
pub struct LineFeed {
    active: Arc<Mutex<Option<SessionId>>>,
    event_tx: Sender<ControllerEvent>,
}

impl LineRecognizer {
    /// Create the recognizer and the feed used to hand it lines
    pub fn new(event_tx: Sender<ControllerEvent>) -> (Self, LineFeed) {
        let active = Arc::new(Mutex::new(None));
        let feed = LineFeed {
            active: Arc::clone(&active),
            event_tx,
        };
        (Self { active }, feed)
    }
}

impl Recognizer for LineRecognizer {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&mut self, session: SessionId) -> Result<()> {
        *self.active.lock() = Some(session);
        Ok(())
    }

    fn stop(&mut self, session: SessionId) {
        let mut active = self.active.lock();
        if *active == Some(session) {
            *active = None;
        }
    }
}

impl LineFeed {
    /// Whether a capture session is waiting for input
    pub fn is_listening(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Deliver `line` as the utterance of the active session
    ///
    /// Returns false when nothing is listening; the line is then left to the
    /// caller.
    pub fn offer(&self, line: &str) -> bool {
        let Some(session) = self.active.lock().take() else {
            return false;
        };

        let signals = [
            RecognizerSignal::Transcript {
                session,
                text: line.to_string(),
            },
            RecognizerSignal::Ended { session },
        ];
        for signal in signals {
            if self.event_tx.send(ControllerEvent::Recognizer(signal)).is_err() {
                debug!("Controller gone, dropping recognizer signal");
                break;
            }
        }
        true
    }
}

/// Synthesizer that simulates playback time
pub struct PacedSynthesizer {
    event_tx: Sender<ControllerEvent>,
    /// Bumped on every speak and cancel; a playback thread only reports
    /// `Ended` if the generation it started with is still current
    generation: Arc<AtomicU64>,
    word_duration: Duration,
}

impl PacedSynthesizer {
    pub fn new(event_tx: Sender<ControllerEvent>) -> Self {
        Self {
            event_tx,
            generation: Arc::new(AtomicU64::new(0)),
            word_duration: Duration::from_millis(350),
        }
    }

    /// Time one word takes at rate 1.0
    pub fn with_word_duration(mut self, duration: Duration) -> Self {
        self.word_duration = duration;
        self
    }

    /// Playback length of `text` at the given voice rate
    pub fn playback_duration(&self, text: &str, voice: &VoiceSettings) -> Duration {
        let words = text.split_whitespace().count().max(1) as u32;
        let rate = if voice.rate > 0.0 { voice.rate as f64 } else { 1.0 };
        let millis = (self.word_duration * words).as_millis() as f64 / rate;
        Duration::from_millis(millis.round() as u64)
    }
}

impl Synthesizer for PacedSynthesizer {
    fn speak(&mut self, utterance: UtteranceId, text: &str, voice: &VoiceSettings) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let event_tx = self.event_tx.clone();
        let duration = self.playback_duration(text, voice);

        debug!("Utterance {} plays for {:?}", utterance, duration);

        thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                let send = |signal| event_tx.send(ControllerEvent::Synthesizer(signal)).is_ok();

                if !send(SynthesisSignal::Started { utterance }) {
                    return;
                }
                thread::sleep(duration);
                if current.load(Ordering::SeqCst) == generation {
                    send(SynthesisSignal::Ended { utterance });
                }
            })?;

        Ok(())
    }

    fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for PacedSynthesizer {
    fn drop(&mut self) {
        // Silence any playback thread still sleeping
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
