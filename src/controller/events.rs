//! Messages flowing into and out of the controller

use crate::completion::CompletionOutcome;
use crate::speech::capture::RecognizerSignal;
use crate::speech::output::SynthesisSignal;
use crate::EmtyError;

/// Signals produced by the leaves, processed in arrival order
#[derive(Clone, Debug)]
pub enum ControllerEvent {
    /// Platform speech-to-text signal
    Recognizer(RecognizerSignal),
    /// Platform text-to-speech signal
    Synthesizer(SynthesisSignal),
    /// A completion request finished
    Completion(CompletionOutcome),
}

/// Requests from the presentation layer
#[derive(Clone, Debug)]
pub enum ControllerCommand {
    /// Start or stop listening; interrupts playback
    ToggleListening,
    /// Submit text as if it had been transcribed
    SubmitTranscript(String),
    /// Empty the message log
    ClearMessages,
    /// Stop all activity and exit the loop
    Shutdown,
}

/// Notifications for the presentation layer
///
/// State should be read from the shared conversation, not rebuilt from these.
#[derive(Clone, Debug)]
pub enum ControllerNotice {
    /// Status or message log may have changed
    StateChanged,
    /// A command was refused
    Rejected(EmtyError),
    /// Controller loop has exited
    Shutdown,
}
