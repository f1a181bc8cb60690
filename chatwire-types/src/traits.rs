//! The backend trait.

use std::future::Future;

use crate::error::BackendError;
use crate::stream::FragmentStream;
use crate::types::{AskOptions, Capabilities, Message};

/// What a backend returns for one request.
#[derive(Debug)]
pub enum Reply {
    /// The complete reply text (non-streaming request).
    Text(String),
    /// Reply fragments as they are decoded (streaming request).
    Stream(FragmentStream),
}

impl Reply {
    /// Resolve to the full reply text, draining the stream if there is one.
    pub async fn into_text(self) -> Result<String, BackendError> {
        match self {
            Reply::Text(text) => Ok(text),
            Reply::Stream(stream) => stream.collect_text().await,
        }
    }
}

/// A chat model endpoint.
///
/// Takes an ordered list of role-tagged messages plus [`AskOptions`] and
/// returns either the whole reply or a lazy fragment stream, depending on
/// [`AskOptions::stream`].
///
/// Uses RPITIT and is not object-safe; compose with `<B: Backend>`.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl Backend for Echo {
///     fn ask(&self, messages: Vec<Message>, _options: AskOptions)
///         -> impl Future<Output = Result<Reply, BackendError>> + Send
///     {
///         let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
///         async move { Ok(Reply::Text(last)) }
///     }
/// }
/// ```
pub trait Backend: Send + Sync {
    /// Optional capabilities of this backend. Defaults to all of them.
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    /// Send one chat request.
    fn ask(
        &self,
        messages: Vec<Message>,
        options: AskOptions,
    ) -> impl Future<Output = Result<Reply, BackendError>> + Send;
}

impl<B: Backend> Backend for &B {
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn ask(
        &self,
        messages: Vec<Message>,
        options: AskOptions,
    ) -> impl Future<Output = Result<Reply, BackendError>> + Send {
        (**self).ask(messages, options)
    }
}
