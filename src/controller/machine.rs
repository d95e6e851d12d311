//! The interaction state machine
//!
//! Transitions:
//! - Idle -> Listening on toggle (cancelling playback first when speaking)
//! - Listening -> Idle on toggle, on an empty transcript or on capture ending
//! - Listening -> Processing on a non-empty transcript
//! - Processing -> Speaking when the reply arrives, -> Idle when it fails
//! - Speaking -> Idle when playback ends or fails
//!
//! The phase is the only source of truth for which activity runs, so two
//! activities can never be active together.

use crate::completion::{CompletionDispatch, CompletionOutcome, TurnId};
use crate::controller::events::ControllerEvent;
use crate::messages::Role;
use crate::settings::CredentialSource;
use crate::speech::capture::{CaptureEvent, SpeechCapture};
use crate::speech::output::{SpeechEvent, SpeechOutput};
use crate::state::{ConversationStatus, Phase, SharedConversation};
use crate::{EmtyError, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct InteractionController {
    state: SharedConversation,
    capture: SpeechCapture,
    output: SpeechOutput,
    completion: Box<dyn CompletionDispatch>,
    credentials: CredentialSource,
    /// Turn whose completion is awaited
    pending_turn: Option<TurnId>,
}

impl InteractionController {
    pub fn new(
        capture: SpeechCapture,
        output: SpeechOutput,
        completion: Box<dyn CompletionDispatch>,
        credentials: CredentialSource,
    ) -> Self {
        let state = SharedConversation::new();

        // Capability is checked once; an unsupported platform is reported here
        // and never again
        if !capture.is_supported() {
            state.write().set_error(EmtyError::Unsupported.user_message());
        }

        Self {
            state,
            capture,
            output,
            completion,
            credentials,
            pending_turn: None,
        }
    }

    /// Read-only view for presentation code
    pub fn conversation(&self) -> SharedConversation {
        self.state.clone()
    }

    pub fn credentials(&self) -> &CredentialSource {
        &self.credentials
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn status(&self) -> ConversationStatus {
        self.state.status()
    }

    pub fn is_capture_supported(&self) -> bool {
        self.capture.is_supported()
    }

    /// Start or stop listening
    ///
    /// Starting while speaking cancels playback before capture begins. Refused
    /// while a request is in flight.
    pub fn toggle_listening(&mut self) -> Result<()> {
        match self.phase() {
            Phase::Listening => {
                self.stop_capture();
                self.set_phase(Phase::Idle);
                Ok(())
            }
            Phase::Processing => {
                warn!("Ignoring listen request while a reply is being prepared");
                Err(EmtyError::Busy("A reply is being prepared".into()))
            }
            Phase::Speaking | Phase::Idle => {
                if !self.capture.is_supported() {
                    return Err(EmtyError::Unsupported);
                }

                if self.phase().is_speaking() {
                    debug!("Barge-in: cancelling playback before listening");
                    self.output.cancel();
                    self.set_phase(Phase::Idle);
                }

                match self.capture.start() {
                    Ok(Some(event)) => {
                        self.on_capture_event(event);
                        Ok(())
                    }
                    Ok(None) => {
                        self.set_phase(Phase::Listening);
                        Ok(())
                    }
                    Err(e) => {
                        self.state.write().set_error(e.user_message());
                        Err(e)
                    }
                }
            }
        }
    }

    /// Send a transcript to the completion service
    ///
    /// Blank text is ignored. A transcript arriving while another request is
    /// in flight is dropped, not queued.
    pub fn submit_transcript(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            debug!("Ignoring empty transcript");
            return Ok(());
        }

        match self.phase() {
            Phase::Processing => {
                warn!("Dropping transcript while already processing");
                return Err(EmtyError::Busy("Already processing a message".into()));
            }
            Phase::Listening => {
                self.stop_capture();
            }
            Phase::Speaking => {
                self.output.cancel();
            }
            Phase::Idle => {}
        }

        let Some(credential) = self.credentials.get() else {
            let err = EmtyError::Config("No API key configured".into());
            warn!("Cannot submit transcript: {}", err);
            let mut state = self.state.write();
            state.set_phase(Phase::Idle);
            state.set_error(err.user_message());
            return Err(err);
        };

        let turn = Uuid::new_v4();
        {
            let mut state = self.state.write();
            state.messages_mut().append(Role::User, text);
            state.clear_error();
            state.set_phase(Phase::Processing);
        }
        self.pending_turn = Some(turn);
        info!("Turn {} submitted ({} chars)", turn, text.len());

        if let Err(e) = self.completion.dispatch(turn, text.to_string(), credential) {
            self.pending_turn = None;
            let mut state = self.state.write();
            state.set_phase(Phase::Idle);
            state.set_error(e.user_message());
            return Err(e);
        }

        Ok(())
    }

    /// Empty the message log; status is untouched
    pub fn clear_messages(&mut self) {
        self.state.write().messages_mut().clear();
        debug!("Message log cleared");
    }

    /// Process one leaf event to completion
    pub fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Recognizer(signal) => {
                for capture_event in self.capture.on_signal(signal) {
                    self.on_capture_event(capture_event);
                }
            }
            ControllerEvent::Synthesizer(signal) => {
                if let Some(speech_event) = self.output.on_signal(signal) {
                    self.on_speech_event(speech_event);
                }
            }
            ControllerEvent::Completion(outcome) => self.on_completion(outcome),
        }
    }

    /// Stop capture and playback and release the completion worker
    pub fn shutdown(&mut self) {
        self.stop_capture();
        self.output.cancel();
        self.completion.shutdown();
        self.pending_turn = None;
        self.set_phase(Phase::Idle);
        info!("Controller shut down");
    }

    fn on_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Transcript(text) => {
                if !self.phase().is_listening() {
                    debug!("Dropping transcript outside of listening");
                    return;
                }
                if text.trim().is_empty() {
                    self.stop_capture();
                    self.set_phase(Phase::Idle);
                    return;
                }
                if let Err(e) = self.submit_transcript(&text) {
                    debug!("Transcript not submitted: {}", e);
                }
            }
            CaptureEvent::ListeningChanged(true) => {
                if self.phase().is_idle() {
                    self.set_phase(Phase::Listening);
                }
            }
            CaptureEvent::ListeningChanged(false) => {
                if self.phase().is_listening() {
                    self.set_phase(Phase::Idle);
                }
            }
            CaptureEvent::Failed(message) => {
                let err = EmtyError::Recognition(message);
                let mut state = self.state.write();
                if state.phase().is_listening() {
                    state.set_phase(Phase::Idle);
                }
                state.set_error(err.user_message());
            }
        }
    }

    fn stop_capture(&mut self) {
        if let Some(event) = self.capture.stop() {
            self.on_capture_event(event);
        }
    }

    fn on_speech_event(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Started => debug!("Playback started"),
            SpeechEvent::Ended => {
                if self.phase().is_speaking() {
                    self.set_phase(Phase::Idle);
                }
            }
            SpeechEvent::Failed(message) => {
                let err = EmtyError::Synthesis(message);
                let mut state = self.state.write();
                if state.phase().is_speaking() {
                    state.set_phase(Phase::Idle);
                }
                state.set_error(err.user_message());
            }
        }
    }

    fn on_completion(&mut self, outcome: CompletionOutcome) {
        if self.pending_turn != Some(outcome.turn) || !self.phase().is_processing() {
            warn!("Discarding completion for stale turn {}", outcome.turn);
            return;
        }
        self.pending_turn = None;

        match outcome.result {
            Ok(reply) => {
                self.state
                    .write()
                    .messages_mut()
                    .append(Role::Assistant, reply.as_str());
                info!("Turn {} answered ({} chars)", outcome.turn, reply.len());

                match self.output.speak(&reply) {
                    Ok(_) => self.set_phase(Phase::Speaking),
                    Err(e) => {
                        let mut state = self.state.write();
                        state.set_phase(Phase::Idle);
                        state.set_error(e.user_message());
                    }
                }
            }
            Err(e) => {
                warn!("Turn {} failed: {}", outcome.turn, e);
                let mut state = self.state.write();
                state.set_phase(Phase::Idle);
                state.set_error(e.user_message());
            }
        }
    }

    fn set_phase(&self, phase: Phase) {
        let mut state = self.state.write();
        if state.phase() != phase {
            debug!("Phase {} -> {}", state.phase(), phase);
            state.set_phase(phase);
        }
    }
}
