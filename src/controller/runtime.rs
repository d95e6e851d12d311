//! Controller thread
//!
//! The controller runs on one dedicated thread. Commands from the presentation
//! layer and events from the leaves are multiplexed with `select!`, and each
//! one is handled to completion before the next is taken, so no handler ever
//! interleaves with another.

use crate::controller::events::{ControllerCommand, ControllerEvent, ControllerNotice};
use crate::controller::machine::InteractionController;
use crate::messages::Message;
use crate::settings::{Credential, CredentialSource};
use crate::state::{ConversationStatus, SharedConversation};
use crate::{EmtyError, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Create the channel leaves use to report events
///
/// Backends get clones of the sender before the controller starts.
pub fn event_channel(capacity: usize) -> (Sender<ControllerEvent>, Receiver<ControllerEvent>) {
    bounded(capacity)
}

/// Handle for controlling a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    command_tx: Sender<ControllerCommand>,
    notice_rx: Receiver<ControllerNotice>,
    state: SharedConversation,
    credentials: CredentialSource,
}

impl ControllerHandle {
    /// Send a command to the controller
    pub fn send_command(&self, cmd: ControllerCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| EmtyError::Channel(format!("Failed to send command: {}", e)))
    }

    pub fn toggle_listening(&self) -> Result<()> {
        self.send_command(ControllerCommand::ToggleListening)
    }

    pub fn submit_transcript(&self, text: impl Into<String>) -> Result<()> {
        self.send_command(ControllerCommand::SubmitTranscript(text.into()))
    }

    pub fn clear_messages(&self) -> Result<()> {
        self.send_command(ControllerCommand::ClearMessages)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send_command(ControllerCommand::Shutdown)
    }

    /// Replace the credential used for the next turn
    pub fn set_credential(&self, credential: Option<Credential>) {
        self.credentials.set(credential);
    }

    /// Try to receive a notice (non-blocking)
    pub fn try_recv_notice(&self) -> Option<ControllerNotice> {
        self.notice_rx.try_recv().ok()
    }

    /// Receive a notice (blocking)
    pub fn recv_notice(&self) -> Result<ControllerNotice> {
        self.notice_rx
            .recv()
            .map_err(|e| EmtyError::Channel(format!("Failed to receive notice: {}", e)))
    }

    pub fn recv_notice_timeout(&self, timeout: Duration) -> Option<ControllerNotice> {
        self.notice_rx.recv_timeout(timeout).ok()
    }

    pub fn conversation(&self) -> &SharedConversation {
        &self.state
    }

    pub fn status(&self) -> ConversationStatus {
        self.state.status()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.messages()
    }
}

/// Move the controller onto its own thread
///
/// Returns the handle used by presentation code and the join handle of the
/// controller thread.
pub fn spawn(
    controller: InteractionController,
    event_rx: Receiver<ControllerEvent>,
    buffer_size: usize,
) -> Result<(ControllerHandle, JoinHandle<()>)> {
    let (command_tx, command_rx) = bounded(buffer_size);
    let (notice_tx, notice_rx) = bounded(buffer_size);

    let handle = ControllerHandle {
        command_tx,
        notice_rx,
        state: controller.conversation(),
        credentials: controller.credentials().clone(),
    };

    let join = thread::Builder::new()
        .name("controller".into())
        .spawn(move || run_loop(controller, command_rx, event_rx, notice_tx))?;

    Ok((handle, join))
}

fn run_loop(
    mut controller: InteractionController,
    command_rx: Receiver<ControllerCommand>,
    event_rx: Receiver<ControllerEvent>,
    notice_tx: Sender<ControllerNotice>,
) {
    info!("Controller loop starting");

    // Notices are best effort; a slow reader must not stall the controller
    let notify = |notice: ControllerNotice| {
        if notice_tx.try_send(notice).is_err() {
            debug!("Notice dropped");
        }
    };

    loop {
        select! {
            recv(command_rx) -> cmd => {
                let result = match cmd {
                    Ok(ControllerCommand::ToggleListening) => controller.toggle_listening(),
                    Ok(ControllerCommand::SubmitTranscript(text)) => controller.submit_transcript(&text),
                    Ok(ControllerCommand::ClearMessages) => {
                        controller.clear_messages();
                        Ok(())
                    }
                    Ok(ControllerCommand::Shutdown) => {
                        info!("Shutdown requested");
                        break;
                    }
                    Err(_) => {
                        warn!("Command channel disconnected");
                        break;
                    }
                };

                if let Err(e) = result {
                    notify(ControllerNotice::Rejected(e));
                }
                notify(ControllerNotice::StateChanged);
            }

            recv(event_rx) -> event => {
                match event {
                    Ok(event) => {
                        controller.handle_event(event);
                        notify(ControllerNotice::StateChanged);
                    }
                    Err(_) => {
                        warn!("Event channel disconnected");
                        break;
                    }
                }
            }
        }
    }

    controller.shutdown();
    // Give a full notice buffer a moment to drain
    let _ = notice_tx.send_timeout(ControllerNotice::Shutdown, Duration::from_millis(100));
    info!("Controller loop exiting");
}
