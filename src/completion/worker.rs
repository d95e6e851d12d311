//! Background completion worker
//!
//! The controller must never block on the network, so requests are handed to
//! a worker thread that owns a tokio runtime. Each request runs as its own
//! task and its result comes back on the controller's event channel, tagged
//! with the turn that asked for it.

use crate::completion::client::CompletionClient;
use crate::controller::ControllerEvent;
use crate::settings::Credential;
use crate::{EmtyError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Identifies one conversation turn
pub type TurnId = Uuid;

/// Result of one completion request
#[derive(Clone, Debug)]
pub struct CompletionOutcome {
    pub turn: TurnId,
    pub result: Result<String>,
}

/// Anything that can start a completion request without blocking
pub trait CompletionDispatch: Send {
    /// Start a request; the outcome arrives later as an event
    fn dispatch(&mut self, turn: TurnId, prompt: String, credential: Credential) -> Result<()>;

    /// Release background resources
    fn shutdown(&mut self) {}
}

enum WorkerCommand {
    Complete {
        turn: TurnId,
        prompt: String,
        credential: Credential,
    },
    Shutdown,
}

/// Completion worker running on its own thread
pub struct CompletionWorker {
    command_tx: Sender<WorkerCommand>,
    worker_handle: Option<JoinHandle<()>>,
}

impl CompletionWorker {
    /// Start the worker thread
    pub fn start(client: CompletionClient, event_tx: Sender<ControllerEvent>) -> Result<Self> {
        let (command_tx, command_rx) = bounded::<WorkerCommand>(16);

        let runtime = Runtime::new().map_err(runtime_error)?;

        let worker_handle = thread::Builder::new()
            .name("completion-worker".into())
            .spawn(move || worker_loop(runtime, Arc::new(client), command_rx, event_tx))?;

        Ok(Self {
            command_tx,
            worker_handle: Some(worker_handle),
        })
    }
}

impl CompletionDispatch for CompletionWorker {
    fn dispatch(&mut self, turn: TurnId, prompt: String, credential: Credential) -> Result<()> {
        self.command_tx
            .send(WorkerCommand::Complete {
                turn,
                prompt,
                credential,
            })
            .map_err(|e| EmtyError::Channel(format!("Failed to send completion request: {}", e)))
    }

    fn shutdown(&mut self) {
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.worker_handle.take() {
            if handle.join().is_err() {
                error!("Completion worker panicked");
            }
        }
    }
}

impl Drop for CompletionWorker {
    fn drop(&mut self) {
        if self.worker_handle.is_some() {
            self.shutdown();
        }
    }
}

fn runtime_error(e: std::io::Error) -> EmtyError {
    EmtyError::Io(format!("Failed to create tokio runtime: {}", e))
}

fn worker_loop(
    runtime: Runtime,
    client: Arc<CompletionClient>,
    command_rx: Receiver<WorkerCommand>,
    event_tx: Sender<ControllerEvent>,
) {
    info!("Completion worker started");

    loop {
        match command_rx.recv() {
            Ok(WorkerCommand::Complete {
                turn,
                prompt,
                credential,
            }) => {
                debug!("Starting completion for turn {}", turn);
                let client = Arc::clone(&client);
                let event_tx = event_tx.clone();

                runtime.spawn(async move {
                    let result = client.complete(&prompt, Some(&credential)).await;
                    let outcome = CompletionOutcome { turn, result };

                    // The event channel is bounded; wait for room off the async workers
                    let delivered = tokio::task::spawn_blocking(move || {
                        event_tx.send(ControllerEvent::Completion(outcome)).is_ok()
                    })
                    .await;
                    if !matches!(delivered, Ok(true)) {
                        warn!("Controller gone, dropping completion for turn {}", turn);
                    }
                });
            }
            Ok(WorkerCommand::Shutdown) => {
                info!("Completion worker shutting down");
                break;
            }
            Err(_) => {
                debug!("Completion command channel closed");
                break;
            }
        }
    }

    runtime.shutdown_background();
    info!("Completion worker stopped");
}
