//! Interaction controller tests
//!
//! These tests drive the controller through its public API with recording
//! leaves, checking the order of leaf calls and the published state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use emty::completion::{CompletionDispatch, CompletionOutcome, TurnId};
use emty::controller::{self, event_channel, ControllerEvent};
use emty::speech::{
    Recognizer, RecognizerSignal, SessionId, SpeechCapture, SpeechOutput, SynthesisSignal,
    Synthesizer, UtteranceId, VoiceSettings,
};
use emty::{Credential, CredentialSource, EmtyError, InteractionController, Phase, Role};
use parking_lot::Mutex;

type Calls = Arc<Mutex<Vec<String>>>;

/// Records every call made to a leaf
#[derive(Clone, Default)]
struct Recorder {
    calls: Calls,
    supported: bool,
}

impl Recorder {
    fn new() -> Self {
        Self {
            calls: Arc::default(),
            supported: true,
        }
    }

    fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn position(&self, prefix: &str) -> Option<usize> {
        self.calls
            .lock()
            .iter()
            .position(|call| call.starts_with(prefix))
    }

    fn reset(&self) {
        self.calls.lock().clear();
    }
}

impl Recognizer for Recorder {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self, session: SessionId) -> emty::Result<()> {
        self.calls.lock().push(format!("capture.start:{}", session));
        Ok(())
    }

    fn stop(&mut self, session: SessionId) {
        self.calls.lock().push(format!("capture.stop:{}", session));
    }
}

impl Synthesizer for Recorder {
    fn speak(&mut self, utterance: UtteranceId, text: &str, _: &VoiceSettings) -> emty::Result<()> {
        self.calls
            .lock()
            .push(format!("output.speak:{}:{}", utterance, text));
        Ok(())
    }

    fn cancel(&mut self) {
        self.calls.lock().push("output.cancel".into());
    }
}

impl CompletionDispatch for Recorder {
    fn dispatch(&mut self, turn: TurnId, prompt: String, _: Credential) -> emty::Result<()> {
        self.calls
            .lock()
            .push(format!("complete:{}:{}", turn, prompt));
        Ok(())
    }
}

struct Harness {
    controller: InteractionController,
    leaves: Recorder,
}

impl Harness {
    fn new(credential: Option<&str>) -> Self {
        Self::with_capture(Recorder::new(), credential)
    }

    fn with_capture(capture: Recorder, credential: Option<&str>) -> Self {
        // One recorder shared by all leaves keeps a single ordered call log
        let leaves = Recorder {
            calls: Arc::clone(&capture.calls),
            supported: true,
        };
        let controller = InteractionController::new(
            SpeechCapture::new(Box::new(capture)),
            SpeechOutput::new(Box::new(leaves.clone()), VoiceSettings::default()),
            Box::new(leaves.clone()),
            CredentialSource::new(credential.and_then(Credential::new)),
        );
        Self { controller, leaves }
    }

    /// Turn id of the most recent dispatch
    fn last_turn(&self) -> TurnId {
        let calls = self.leaves.calls();
        let call = calls
            .iter()
            .rev()
            .find(|call| call.starts_with("complete:"))
            .expect("no completion dispatched");
        let id = call.split(':').nth(1).expect("malformed dispatch record");
        id.parse().expect("turn id is not a uuid")
    }

    fn complete(&mut self, result: emty::Result<String>) {
        let turn = self.last_turn();
        self.controller
            .handle_event(ControllerEvent::Completion(CompletionOutcome { turn, result }));
    }

    fn synthesizer(&mut self, signal: SynthesisSignal) {
        self.controller
            .handle_event(ControllerEvent::Synthesizer(signal));
    }

    fn recognizer(&mut self, signal: RecognizerSignal) {
        self.controller
            .handle_event(ControllerEvent::Recognizer(signal));
    }

    /// Drive a full turn up to the point where the reply is playing
    fn reach_speaking(&mut self, prompt: &str, reply: &str) {
        self.controller.submit_transcript(prompt).unwrap();
        self.complete(Ok(reply.into()));
        assert_eq!(self.controller.phase(), Phase::Speaking);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_successful_turn() {
    let mut h = Harness::new(Some("sk-test"));

    h.controller.submit_transcript("merhaba").unwrap();
    assert!(h.controller.status().processing);

    h.complete(Ok("Selam!".into()));
    assert!(h.controller.status().speaking);
    assert_eq!(h.leaves.count("output.speak:1:Selam!"), 1);

    h.synthesizer(SynthesisSignal::Started { utterance: 1 });
    h.synthesizer(SynthesisSignal::Ended { utterance: 1 });

    let messages = h.controller.conversation().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role(), Role::User);
    assert_eq!(messages[0].content(), "merhaba");
    assert_eq!(messages[1].role(), Role::Assistant);
    assert_eq!(messages[1].content(), "Selam!");

    let status = h.controller.status();
    assert!(status.is_idle());
    assert_eq!(status.error, None);
}

#[test]
fn scenario_empty_transcript_is_ignored() {
    let mut h = Harness::new(Some("sk-test"));
    let before = h.controller.status();

    h.controller.submit_transcript("").unwrap();

    assert_eq!(h.controller.status(), before);
    assert_eq!(h.controller.conversation().message_count(), 0);
    assert!(h.leaves.calls().is_empty());
}

#[test]
fn scenario_missing_credential() {
    let mut h = Harness::new(None);

    let result = h.controller.submit_transcript("test");

    assert!(matches!(result, Err(EmtyError::Config(_))));
    assert_eq!(h.leaves.count("complete:"), 0);
    assert_eq!(h.controller.conversation().message_count(), 0);

    let status = h.controller.status();
    assert!(status.is_idle());
    assert_eq!(
        status.error.as_deref(),
        Some("API anahtarı yapılandırılmamış")
    );
}

#[test]
fn scenario_transport_error() {
    let mut h = Harness::new(Some("sk-test"));

    h.controller.submit_transcript("test").unwrap();
    h.complete(Err(EmtyError::Transport("API request failed: 503".into())));

    let messages = h.controller.conversation().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role(), Role::User);
    assert_eq!(messages[0].content(), "test");

    let status = h.controller.status();
    assert!(status.is_idle());
    assert_eq!(
        status.error.as_deref(),
        Some("AI yanıtı alınamadı. Lütfen tekrar deneyin.")
    );
    assert_eq!(h.leaves.count("output.speak"), 0);
}

#[test]
fn scenario_barge_in_cancels_before_listening() {
    let mut h = Harness::new(Some("sk-test"));
    h.reach_speaking("merhaba", "Uzun bir cevap");
    h.leaves.reset();

    h.controller.toggle_listening().unwrap();

    let cancel = h.leaves.position("output.cancel").expect("no cancel");
    let start = h.leaves.position("capture.start").expect("no capture start");
    assert!(cancel < start);

    let status = h.controller.status();
    assert!(!status.speaking);
    assert!(status.listening);

    // The cancelled utterance reporting its end must not disturb listening
    h.synthesizer(SynthesisSignal::Ended { utterance: 1 });
    assert_eq!(h.controller.phase(), Phase::Listening);
}

#[test]
fn submit_while_speaking_cancels_before_dispatch() {
    let mut h = Harness::new(Some("sk-test"));
    h.reach_speaking("merhaba", "Uzun bir cevap");
    h.leaves.reset();

    h.controller.submit_transcript("dur").unwrap();

    let cancel = h.leaves.position("output.cancel").expect("no cancel");
    let dispatch = h.leaves.position("complete:").expect("no dispatch");
    assert!(cancel < dispatch);
    assert_eq!(h.leaves.count("output.cancel"), 1);

    let status = h.controller.status();
    assert!(!status.speaking);
    assert!(status.processing);

    // The interrupted utterance ending late does not touch the new turn
    h.synthesizer(SynthesisSignal::Ended { utterance: 1 });
    assert_eq!(h.controller.phase(), Phase::Processing);
}

#[test]
fn listening_cycle_reports_through_capture() {
    let mut h = Harness::new(Some("sk-test"));

    h.controller.toggle_listening().unwrap();
    assert_eq!(h.controller.phase(), Phase::Listening);
    h.controller.toggle_listening().unwrap();
    assert_eq!(h.controller.phase(), Phase::Idle);

    assert_eq!(h.leaves.calls(), ["capture.start:1", "capture.stop:1"]);
}

#[test]
fn scenario_toggle_while_processing_is_rejected() {
    let mut h = Harness::new(Some("sk-test"));
    h.controller.submit_transcript("test").unwrap();
    let before = h.controller.status();
    h.leaves.reset();

    let result = h.controller.toggle_listening();

    assert!(matches!(result, Err(EmtyError::Busy(_))));
    assert_eq!(h.controller.status(), before);
    assert!(h.leaves.calls().is_empty());
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn at_most_one_activity_through_a_session() {
    let mut h = Harness::new(Some("sk-test"));
    let mut observed = vec![h.controller.status()];

    h.controller.toggle_listening().unwrap();
    observed.push(h.controller.status());

    h.recognizer(RecognizerSignal::Transcript {
        session: 1,
        text: "merhaba".into(),
    });
    observed.push(h.controller.status());

    // A second transcript while processing is dropped
    assert!(h.controller.submit_transcript("tekrar").is_err());
    observed.push(h.controller.status());

    h.complete(Ok("Selam!".into()));
    observed.push(h.controller.status());

    h.controller.toggle_listening().unwrap();
    observed.push(h.controller.status());

    h.controller.toggle_listening().unwrap();
    observed.push(h.controller.status());

    for status in &observed {
        assert!(status.active_count() <= 1, "{:?}", status);
    }
    assert_eq!(h.controller.conversation().message_count(), 2);
}

#[test]
fn whitespace_transcripts_change_nothing() {
    for text in ["", " ", "\t", "\n", "  \t \n "] {
        let mut h = Harness::new(Some("sk-test"));
        let before = h.controller.status();

        h.controller.submit_transcript(text).unwrap();

        assert_eq!(h.controller.status(), before, "{:?}", text);
        assert_eq!(h.controller.conversation().message_count(), 0);
        assert_eq!(h.leaves.count("complete:"), 0);
    }
}

#[test]
fn successful_turns_append_user_then_assistant() {
    let mut h = Harness::new(Some("sk-test"));

    for (prompt, reply) in [("bir", "one"), ("iki", "two"), ("üç", "three")] {
        let before = h.controller.conversation().message_count();
        h.reach_speaking(prompt, reply);
        h.synthesizer(SynthesisSignal::Ended {
            utterance: h.leaves.count("output.speak") as u64,
        });
        assert_eq!(h.controller.phase(), Phase::Idle);

        let messages = h.controller.conversation().messages();
        assert_eq!(messages.len(), before + 2);

        let user = &messages[before];
        let assistant = &messages[before + 1];
        assert_eq!(user.role(), Role::User);
        assert_eq!(user.content(), prompt);
        assert_eq!(assistant.role(), Role::Assistant);
        assert_eq!(assistant.content(), reply);
        assert!(assistant.created_at() >= user.created_at());
        assert!(assistant.id() > user.id());
    }
}

#[test]
fn cancel_when_idle_is_silent() {
    let leaves = Recorder::new();
    let mut output = SpeechOutput::new(Box::new(leaves.clone()), VoiceSettings::default());

    assert!(!output.cancel());
    assert!(!output.cancel());
    assert!(leaves.calls().is_empty());
}

#[test]
fn error_cleared_by_next_submission() {
    let mut h = Harness::new(Some("sk-test"));
    h.controller.submit_transcript("test").unwrap();
    h.complete(Err(EmtyError::Transport("timeout".into())));
    assert!(h.controller.status().error.is_some());

    h.controller.submit_transcript("tekrar").unwrap();
    assert!(h.controller.status().error.is_none());
    assert!(h.controller.status().processing);
}

#[test]
fn credential_update_applies_to_next_turn() {
    let mut h = Harness::new(None);
    assert!(h.controller.submit_transcript("test").is_err());

    h.controller.credentials().set(Credential::new("sk-new"));
    h.controller.submit_transcript("test").unwrap();
    assert_eq!(h.leaves.count("complete:"), 1);
}

#[test]
fn unsupported_capture_reported_once() {
    let mut h = Harness::with_capture(Recorder::unsupported(), Some("sk-test"));

    assert!(!h.controller.is_capture_supported());
    assert!(h.controller.status().error.is_some());

    let result = h.controller.toggle_listening();
    assert!(matches!(result, Err(EmtyError::Unsupported)));
    assert!(h.controller.status().is_idle());
    assert_eq!(h.leaves.count("capture.start"), 0);

    // Typed input still works without capture
    h.controller.submit_transcript("merhaba").unwrap();
    assert!(h.controller.status().processing);
}

#[test]
fn recognition_failure_stops_listening() {
    let mut h = Harness::new(Some("sk-test"));
    h.controller.toggle_listening().unwrap();

    h.recognizer(RecognizerSignal::Error {
        session: 1,
        message: "no-speech".into(),
    });

    let status = h.controller.status();
    assert!(status.is_idle());
    assert!(status.error.unwrap().contains("no-speech"));
    assert_eq!(h.controller.conversation().message_count(), 0);
}

#[test]
fn clear_messages_keeps_status() {
    let mut h = Harness::new(Some("sk-test"));
    h.reach_speaking("merhaba", "Selam!");

    h.controller.clear_messages();

    assert_eq!(h.controller.conversation().message_count(), 0);
    assert!(h.controller.status().speaking);
}

// ============================================================================
// Threaded run loop
// ============================================================================

/// Replies to every prompt immediately through the event channel
struct EchoDispatch {
    events: Sender<ControllerEvent>,
}

impl CompletionDispatch for EchoDispatch {
    fn dispatch(&mut self, turn: TurnId, prompt: String, _: Credential) -> emty::Result<()> {
        let outcome = CompletionOutcome {
            turn,
            result: Ok(format!("yankı: {}", prompt)),
        };
        self.events
            .send(ControllerEvent::Completion(outcome))
            .map_err(|e| EmtyError::Channel(e.to_string()))
    }
}

/// Plays every utterance instantly
struct InstantSynth {
    events: Sender<ControllerEvent>,
}

impl Synthesizer for InstantSynth {
    fn speak(&mut self, utterance: UtteranceId, _: &str, _: &VoiceSettings) -> emty::Result<()> {
        for signal in [
            SynthesisSignal::Started { utterance },
            SynthesisSignal::Ended { utterance },
        ] {
            self.events
                .send(ControllerEvent::Synthesizer(signal))
                .map_err(|e| EmtyError::Channel(e.to_string()))?;
        }
        Ok(())
    }

    fn cancel(&mut self) {}
}

#[test]
fn threaded_turn_completes() {
    let (event_tx, event_rx) = event_channel(32);
    let interaction = InteractionController::new(
        SpeechCapture::new(Box::new(Recorder::new())),
        SpeechOutput::new(
            Box::new(InstantSynth {
                events: event_tx.clone(),
            }),
            VoiceSettings::default(),
        ),
        Box::new(EchoDispatch { events: event_tx }),
        CredentialSource::new(Credential::new("sk-test")),
    );

    let (handle, join) = controller::spawn(interaction, event_rx, 32).unwrap();
    handle.submit_transcript("merhaba").unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if handle.conversation().message_count() == 2 && handle.status().is_idle() {
            break;
        }
        handle.recv_notice_timeout(Duration::from_millis(50));
    }

    let messages = handle.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content(), "yankı: merhaba");
    assert!(handle.status().is_idle());

    handle.shutdown().unwrap();
    join.join().unwrap();
}

#[test]
fn threaded_rejection_is_reported() {
    let (event_tx, event_rx) = event_channel(8);
    let interaction = InteractionController::new(
        SpeechCapture::new(Box::new(Recorder::new())),
        SpeechOutput::new(Box::new(Recorder::new()), VoiceSettings::default()),
        Box::new(EchoDispatch { events: event_tx }),
        CredentialSource::default(),
    );

    let (handle, join) = controller::spawn(interaction, event_rx, 8).unwrap();
    handle.submit_transcript("test").unwrap();

    let mut rejected = None;
    let deadline = Instant::now() + Duration::from_secs(5);
    while rejected.is_none() && Instant::now() < deadline {
        if let Some(emty::controller::ControllerNotice::Rejected(e)) =
            handle.recv_notice_timeout(Duration::from_millis(50))
        {
            rejected = Some(e);
        }
    }
    assert!(matches!(rejected, Some(EmtyError::Config(_))));

    handle.shutdown().unwrap();
    join.join().unwrap();
}
