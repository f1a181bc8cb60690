//! Fragment streams for incremental replies.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};

use crate::error::BackendError;
use crate::types::{ChatHistory, Message};

/// A lazy, single-pass sequence of content fragments.
///
/// Each item is one non-empty piece of generated text, in arrival order. An
/// `Err` item ends the sequence; fragments yielded before it stay valid.
pub struct FragmentStream {
    /// The underlying stream. Consume with `StreamExt::next()` or poll
    /// [`FragmentStream`] directly.
    pub receiver: Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>,
}

impl FragmentStream {
    /// Wrap any fragment stream.
    pub fn new(stream: impl Stream<Item = Result<String, BackendError>> + Send + 'static) -> Self {
        Self {
            receiver: Box::pin(stream),
        }
    }

    /// A stream over already-decoded fragments.
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures::stream::iter(fragments.into_iter().map(Ok)))
    }

    /// Record the assembled reply into `history` once the stream concludes.
    pub fn recorded(self, history: &mut ChatHistory) -> RecordingStream<'_> {
        RecordingStream::new(self, Some(history))
    }

    /// Drain the stream and concatenate every fragment (aggregate mode).
    pub async fn collect_text(mut self) -> Result<String, BackendError> {
        let mut text = String::new();
        while let Some(fragment) = self.receiver.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for FragmentStream {
    type Item = Result<String, BackendError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentStream").finish_non_exhaustive()
    }
}

/// A [`FragmentStream`] that appends one assistant entry to a history log
/// after the stream concludes successfully.
///
/// Nothing is appended when the stream fails or is dropped before the end.
pub struct RecordingStream<'a> {
    inner: FragmentStream,
    history: Option<&'a mut ChatHistory>,
    text: String,
    finished: bool,
}

impl<'a> RecordingStream<'a> {
    /// Wrap `inner`; when `history` is `None` this only tracks the text.
    pub fn new(inner: FragmentStream, history: Option<&'a mut ChatHistory>) -> Self {
        Self {
            inner,
            history,
            text: String::new(),
            finished: false,
        }
    }

    /// Text received so far.
    #[must_use]
    pub fn text_so_far(&self) -> &str {
        &self.text
    }

    /// Drain the stream and return the concatenated text (aggregate mode).
    ///
    /// The history entry is appended exactly as in streaming mode.
    pub async fn collect_text(mut self) -> Result<String, BackendError> {
        while let Some(fragment) = self.next().await {
            fragment?;
        }
        Ok(std::mem::take(&mut self.text))
    }

    fn conclude(&mut self) {
        self.finished = true;
        if let Some(history) = self.history.take() {
            tracing::debug!(chars = self.text.len(), "stream concluded, recording reply");
            history.push(Message::assistant(self.text.clone()));
        }
    }
}

impl Stream for RecordingStream<'_> {
    type Item = Result<String, BackendError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(fragment))) => {
                this.text.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.finished = true;
                this.history = None;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.conclude();
                Poll::Ready(None)
            }
        }
    }
}

impl std::fmt::Debug for RecordingStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingStream")
            .field("text", &self.text)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
