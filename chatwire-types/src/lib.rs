//! Shared types for chatwire.
//!
//! Holds the conversation model ([`Message`], [`ChatHistory`]), the
//! [`Backend`] trait every model endpoint implements, the [`BackendError`]
//! taxonomy, and the fragment stream types produced by streaming replies.

pub mod error;
pub mod stream;
pub mod traits;
pub mod types;

pub use error::*;
pub use stream::*;
pub use traits::*;
pub use types::*;
