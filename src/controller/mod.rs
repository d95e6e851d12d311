//! Interaction controller
//!
//! Owns the conversation state and sequences capture, completion and speech
//! output for each turn:
//!
//! ```text
//! Idle -> Listening -> Processing -> Speaking -> Idle
//! ```
//!
//! - **machine**: the state machine itself; every method runs to completion
//! - **events**: inputs from the leaves and from the presentation layer
//! - **runtime**: a thread that owns the machine and multiplexes its inputs

pub mod events;
pub mod machine;
pub mod runtime;

pub use events::{ControllerCommand, ControllerEvent, ControllerNotice};
pub use machine::InteractionController;
pub use runtime::{event_channel, spawn, ControllerHandle};
