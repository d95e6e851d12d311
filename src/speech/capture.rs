//! Speech capture adapter
//!
//! Wraps a platform [`Recognizer`] and turns its raw, possibly late signals
//! into clean [`CaptureEvent`]s:
//! - one finalized transcript per completed utterance (empty if nothing was
//!   understood)
//! - one listening change per session
//! - nothing at all for a session that has already been stopped

use crate::{EmtyError, Result};
use tracing::{debug, info, warn};

/// Identifies one start/stop cycle of the recognizer
pub type SessionId = u64;

/// Raw signal reported by a platform recognizer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecognizerSignal {
    /// A finalized transcript for the session
    Transcript { session: SessionId, text: String },
    /// Recognition failed mid-session
    Error { session: SessionId, message: String },
    /// The platform ended the session on its own
    Ended { session: SessionId },
}

impl RecognizerSignal {
    pub fn session(&self) -> SessionId {
        match self {
            RecognizerSignal::Transcript { session, .. }
            | RecognizerSignal::Error { session, .. }
            | RecognizerSignal::Ended { session } => *session,
        }
    }
}

/// Platform speech-to-text control surface
///
/// Implementations report results asynchronously as [`RecognizerSignal`]s
/// tagged with the session they were started with.
pub trait Recognizer: Send {
    /// Whether speech recognition exists on this platform
    fn is_supported(&self) -> bool;

    /// Begin capturing for a new session
    fn start(&mut self, session: SessionId) -> Result<()>;

    /// End capture for the given session
    fn stop(&mut self, session: SessionId);
}

/// Event delivered to the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Finalized transcript, possibly empty
    Transcript(String),
    /// Capture started (`true`) or stopped (`false`); once each per session
    ListeningChanged(bool),
    /// Platform-level recognition failure; capture has stopped
    Failed(String),
}

/// Speech capture adapter
pub struct SpeechCapture {
    recognizer: Box<dyn Recognizer>,
    /// Queried once at construction
    supported: bool,
    next_session: SessionId,
    active: Option<SessionId>,
    /// Whether the active session already produced its transcript
    transcript_delivered: bool,
}

impl SpeechCapture {
    pub fn new(recognizer: Box<dyn Recognizer>) -> Self {
        let supported = recognizer.is_supported();
        if !supported {
            warn!("Speech recognition is not supported on this platform");
        }

        Self {
            recognizer,
            supported,
            next_session: 1,
            active: None,
            transcript_delivered: false,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn is_listening(&self) -> bool {
        self.active.is_some()
    }

    /// Start capturing
    ///
    /// Returns the listening change for a new session, or `None` when capture
    /// was already running.
    pub fn start(&mut self) -> Result<Option<CaptureEvent>> {
        if !self.supported {
            return Err(EmtyError::Unsupported);
        }
        if self.active.is_some() {
            debug!("Capture already running");
            return Ok(None);
        }

        let session = self.next_session;
        self.next_session += 1;

        self.recognizer.start(session)?;

        self.active = Some(session);
        self.transcript_delivered = false;
        info!("Capture session {} started", session);
        Ok(Some(CaptureEvent::ListeningChanged(true)))
    }

    /// Stop capturing
    ///
    /// Returns the listening change if a session was running. Signals that
    /// arrive later for the stopped session are dropped.
    pub fn stop(&mut self) -> Option<CaptureEvent> {
        let session = self.active.take()?;
        self.recognizer.stop(session);
        info!("Capture session {} stopped", session);
        Some(CaptureEvent::ListeningChanged(false))
    }

    /// Translate a raw platform signal into controller events
    pub fn on_signal(&mut self, signal: RecognizerSignal) -> Vec<CaptureEvent> {
        if self.active != Some(signal.session()) {
            debug!("Dropping signal for inactive session {}", signal.session());
            return Vec::new();
        }

        match signal {
            RecognizerSignal::Transcript { text, .. } => {
                if self.transcript_delivered {
                    debug!("Dropping extra transcript for the current utterance");
                    return Vec::new();
                }
                self.transcript_delivered = true;
                vec![CaptureEvent::Transcript(text)]
            }
            RecognizerSignal::Error { message, .. } => {
                warn!("Recognition failed: {}", message);
                self.active = None;
                vec![
                    CaptureEvent::Failed(message),
                    CaptureEvent::ListeningChanged(false),
                ]
            }
            RecognizerSignal::Ended { .. } => {
                self.active = None;
                if self.transcript_delivered {
                    vec![CaptureEvent::ListeningChanged(false)]
                } else {
                    // Utterance completed without anything intelligible
                    vec![
                        CaptureEvent::Transcript(String::new()),
                        CaptureEvent::ListeningChanged(false),
                    ]
                }
            }
        }
    }
}
