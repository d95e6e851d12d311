//! Completion service integration
//!
//! - **client**: one HTTP request/response round trip per prompt
//! - **worker**: runs the client on a background async runtime and reports
//!   each result back to the controller as an event

pub mod client;
pub mod worker;

pub use client::{parse_reply, CompletionClient, CompletionConfig};
pub use worker::{CompletionDispatch, CompletionOutcome, CompletionWorker, TurnId};
