//! Speech output adapter
//!
//! Wraps a platform [`Synthesizer`]. Each `speak()` supersedes whatever was
//! playing; only the current utterance reports events, and it reports exactly
//! one `Ended` or `Failed`.

use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Identifies one `speak()` call
pub type UtteranceId = u64;

/// Voice parameters passed to the synthesizer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// BCP 47 language tag
    pub language: String,
    /// Speaking rate (1.0 = normal)
    pub rate: f32,
    /// Pitch (1.0 = normal)
    pub pitch: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language: "tr-TR".to_string(),
            rate: 0.9,
            pitch: 1.0,
        }
    }
}

impl VoiceSettings {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }
}

/// Raw signal reported by a platform synthesizer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SynthesisSignal {
    Started { utterance: UtteranceId },
    Ended { utterance: UtteranceId },
    Error { utterance: UtteranceId, message: String },
}

impl SynthesisSignal {
    pub fn utterance(&self) -> UtteranceId {
        match self {
            SynthesisSignal::Started { utterance }
            | SynthesisSignal::Ended { utterance }
            | SynthesisSignal::Error { utterance, .. } => *utterance,
        }
    }
}

/// Platform text-to-speech control surface
pub trait Synthesizer: Send {
    /// Begin playing `text`; progress is reported as [`SynthesisSignal`]s
    fn speak(&mut self, utterance: UtteranceId, text: &str, voice: &VoiceSettings) -> Result<()>;

    /// Stop playback immediately
    fn cancel(&mut self);
}

/// Event delivered to the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Ended,
    Failed(String),
}

/// Speech output adapter
pub struct SpeechOutput {
    synthesizer: Box<dyn Synthesizer>,
    voice: VoiceSettings,
    next_utterance: UtteranceId,
    current: Option<UtteranceId>,
}

impl SpeechOutput {
    pub fn new(synthesizer: Box<dyn Synthesizer>, voice: VoiceSettings) -> Self {
        Self {
            synthesizer,
            voice,
            next_utterance: 1,
            current: None,
        }
    }

    pub fn voice(&self) -> &VoiceSettings {
        &self.voice
    }

    pub fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    /// Cancel any current utterance and start speaking `text`
    pub fn speak(&mut self, text: &str) -> Result<UtteranceId> {
        if self.current.is_some() {
            self.cancel();
        }

        let utterance = self.next_utterance;
        self.next_utterance += 1;

        self.synthesizer.speak(utterance, text, &self.voice)?;

        self.current = Some(utterance);
        debug!("Utterance {} queued ({} chars)", utterance, text.len());
        Ok(utterance)
    }

    /// Stop playback
    ///
    /// Returns whether anything was playing. Calling this while idle does
    /// nothing and produces no event.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(utterance) => {
                self.synthesizer.cancel();
                info!("Utterance {} cancelled", utterance);
                true
            }
            None => false,
        }
    }

    /// Translate a raw platform signal into a controller event
    pub fn on_signal(&mut self, signal: SynthesisSignal) -> Option<SpeechEvent> {
        if self.current != Some(signal.utterance()) {
            debug!("Dropping signal for superseded utterance {}", signal.utterance());
            return None;
        }

        match signal {
            SynthesisSignal::Started { .. } => Some(SpeechEvent::Started),
            SynthesisSignal::Ended { .. } => {
                self.current = None;
                Some(SpeechEvent::Ended)
            }
            SynthesisSignal::Error { message, .. } => {
                warn!("Synthesis failed: {}", message);
                self.current = None;
                Some(SpeechEvent::Failed(message))
            }
        }
    }
}
