//! Speech adapters for capture (STT) and output (TTS)
//!
//! This module provides:
//! - The capture adapter over a platform recognizer
//! - The output adapter over a platform synthesizer
//! - Terminal backends for running without audio hardware

pub mod capture;
pub mod output;
pub mod terminal;

// Re-export commonly used types
pub use capture::{CaptureEvent, Recognizer, RecognizerSignal, SessionId, SpeechCapture};
pub use output::{
    SpeechEvent, SpeechOutput, SynthesisSignal, Synthesizer, UtteranceId, VoiceSettings,
};
pub use terminal::{LineFeed, LineRecognizer, PacedSynthesizer};
