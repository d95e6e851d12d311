//! Conversation state owned by the interaction controller
//!
//! The controller is the only writer. Presentation code gets a
//! [`SharedConversation`], which can be cloned freely but only exposes reads:
//! - **Phase**: the single activity currently running
//! - **Status**: boolean flags derived from the phase, plus the last error
//! - **Messages**: the ordered message log

use crate::messages::{Message, MessageLog};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// The activity the assistant is busy with
///
/// Exactly one phase is current, which is what keeps listening, processing and
/// speaking mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Nothing in progress
    #[default]
    Idle,
    /// Capture is streaming audio and waiting for a transcript
    Listening,
    /// A completion request is in flight
    Processing,
    /// The reply is being played back
    Speaking,
}

impl Phase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    pub fn is_listening(&self) -> bool {
        matches!(self, Phase::Listening)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Phase::Processing)
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self, Phase::Speaking)
    }

    /// Status line shown next to the microphone button
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "Konuşmak için tıkla",
            Phase::Listening => "Dinliyor...",
            Phase::Processing => "Düşünüyor...",
            Phase::Speaking => "Konuşuyor...",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Listening => write!(f, "Listening"),
            Phase::Processing => write!(f, "Processing"),
            Phase::Speaking => write!(f, "Speaking"),
        }
    }
}

/// What the system is doing right now, as seen by presentation code
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversationStatus {
    pub listening: bool,
    pub processing: bool,
    pub speaking: bool,
    pub error: Option<String>,
}

impl ConversationStatus {
    fn new(phase: Phase, error: Option<String>) -> Self {
        Self {
            listening: phase.is_listening(),
            processing: phase.is_processing(),
            speaking: phase.is_speaking(),
            error,
        }
    }

    /// Number of activity flags set; never more than one
    pub fn active_count(&self) -> usize {
        [self.listening, self.processing, self.speaking]
            .iter()
            .filter(|flag| **flag)
            .count()
    }

    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }
}

/// Complete conversation state
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    phase: Phase,
    error: Option<String>,
    messages: MessageLog,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn status(&self) -> ConversationStatus {
        ConversationStatus::new(self.phase, self.error.clone())
    }

    // === Writes, controller only ===

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }

    pub(crate) fn messages_mut(&mut self) -> &mut MessageLog {
        &mut self.messages
    }
}

/// Thread-safe, read-only view of the conversation
///
/// Clones share the same state. Only the controller inside this crate can
/// obtain a write guard.
#[derive(Clone, Default)]
pub struct SharedConversation {
    inner: Arc<RwLock<ConversationState>>,
}

impl SharedConversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn write(&self) -> parking_lot::RwLockWriteGuard<'_, ConversationState> {
        self.inner.write()
    }

    /// Get a read lock on the state
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, ConversationState> {
        self.inner.read()
    }

    pub fn phase(&self) -> Phase {
        self.inner.read().phase
    }

    pub fn status(&self) -> ConversationStatus {
        self.inner.read().status()
    }

    /// Copy of the message log in creation order
    pub fn messages(&self) -> Vec<Message> {
        self.inner.read().messages.get_all()
    }

    pub fn message_count(&self) -> usize {
        self.inner.read().messages.len()
    }
}

impl std::fmt::Debug for SharedConversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read();
        f.debug_struct("SharedConversation")
            .field("phase", &state.phase)
            .field("error", &state.error)
            .field("messages", &state.messages.len())
            .finish()
    }
}
