//! Core domain types and traits for Riskpilot.
//!
//! This crate holds the value objects that flow through the whole system:
//! a user Query enters a Session, the orchestrator composes a ModelRequest
//! from its history, a ModelClient sends it upstream, and the reply comes
//! back as an assistant Message.

pub mod client;
pub mod error;
pub mod message;

pub use client::{ModelClient, ModelReply, ModelRequest, PromptMessage, Usage};
pub use error::{ModelError, OrchestratorError, PromptError, SessionError};
pub use message::{Message, Query, Role, Session, SessionId};
