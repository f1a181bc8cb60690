//! OpenAI-compatible chat completions backend for chatwire.
//!
//! This crate implements the [`Backend`] trait from `chatwire-types` for any
//! server speaking the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat):
//! the hosted OpenAI API and local servers such as LM Studio.
//!
//! # Usage
//!
//! ```no_run
//! use chatwire_provider_openai::OpenAi;
//!
//! let hosted = OpenAi::new("your-api-key").model("gpt-4o-mini");
//! let local = OpenAi::local().model("deepseek-r1-distill-qwen-7b");
//! ```
//!
//! # Features
//!
//! - Full [`Backend`] implementation, streaming and non-streaming
//! - Image attachments mapped to `image_url` content parts
//! - JSON-object response format
//! - A standalone [`streaming`] decoder for `data: ` framed chunk streams
//! - Model listing via [`OpenAi::models`]

pub mod client;
pub mod error;
pub mod mapping;
pub mod streaming;

pub use client::OpenAi;
pub use streaming::{Fragments, LineOutcome, decode_line, decode_lines};

// Re-export chatwire-types for convenience
pub use chatwire_types::{Backend, BackendError, FragmentStream, Reply};
