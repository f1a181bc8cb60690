//! Conversation agent for chatwire.
//!
//! An [`Agent`] wraps any [`Backend`](chatwire_types::Backend) with a system
//! prompt, per-agent options, and a chat history. It is the caller-facing
//! surface: one prompt (plus optional images and prior turns) in, one
//! [`Answer`] out.

pub mod agent;
pub mod config;

pub use agent::{Agent, AgentError, Answer};
pub use config::{AgentConfig, AgentType};
