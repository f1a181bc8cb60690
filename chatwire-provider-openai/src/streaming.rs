//! Decoder for streamed chat completions.
//!
//! Streaming responses arrive as lines framed like server-sent events:
//! ```text
//! data: {"id":"...","choices":[{"delta":{"role":"assistant"}}]}
//!
//! data: {"id":"...","choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"id":"...","choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Each line is decoded on its own: blank lines are skipped, the `data: `
//! prefix is stripped, `[DONE]` ends the stream, and anything else must be a
//! JSON object. Text in `choices[0].delta.content` becomes a fragment. A
//! payload that is not JSON ends the stream with [`BackendError::Decode`].
//!
//! Reference: <https://platform.openai.com/docs/api-reference/chat/streaming>

use std::time::Duration;

use bytes::Bytes;
use chatwire_types::{BackendError, ChatHistory, FragmentStream, Message};
use futures::{Stream, StreamExt};
use reqwest::{Response, StatusCode};

use crate::error::{map_http_status, map_reqwest_error};

/// Line prefix framing every event (six characters, including the space).
pub const DATA_PREFIX: &str = "data: ";

/// Payload that marks the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// What a single line decodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Nothing to emit (blank line, role-only or finish-reason event).
    Skip,
    /// A non-empty content fragment.
    Fragment(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Decode one raw line.
///
/// A trailing `\r` is treated as part of the line terminator.
pub fn decode_line(line: &str) -> Result<LineOutcome, BackendError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return Ok(LineOutcome::Skip);
    }

    let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
    if payload == DONE_SENTINEL {
        return Ok(LineOutcome::Done);
    }

    let chunk: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| BackendError::Decode(format!("payload is not valid JSON: {e}")))?;
    let Some(object) = chunk.as_object() else {
        return Err(BackendError::Decode(format!(
            "payload is not a JSON object: {payload}"
        )));
    };

    match chunk["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => Ok(LineOutcome::Fragment(content.to_string())),
        _ => {
            if let Some(error) = object.get("error") {
                tracing::warn!(%error, "error object in completion stream");
            }
            Ok(LineOutcome::Skip)
        }
    }
}

/// Lazy fragment iterator over a sequence of raw lines.
///
/// Stops after `[DONE]`, at the end of the lines, or right after yielding a
/// decode error. Lines past that point are never read.
#[derive(Debug)]
pub struct Fragments<I> {
    lines: I,
    finished: bool,
}

impl<I> Fragments<I> {
    /// Decode `lines` without a status check.
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            finished: false,
        }
    }
}

impl<I, S> Fragments<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    /// Drain the lines and concatenate every fragment (aggregate mode).
    pub fn collect_text(self) -> Result<String, BackendError> {
        self.collect()
    }

    /// Like [`collect_text`](Self::collect_text), then append the assembled
    /// reply to `history` as one assistant entry.
    ///
    /// Nothing is appended when decoding fails.
    pub fn collect_text_into(self, history: &mut ChatHistory) -> Result<String, BackendError> {
        let text = self.collect_text()?;
        history.push(Message::assistant(text.clone()));
        Ok(text)
    }
}

impl<I, S> Iterator for Fragments<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Result<String, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        for line in self.lines.by_ref() {
            match decode_line(line.as_ref()) {
                Ok(LineOutcome::Skip) => continue,
                Ok(LineOutcome::Fragment(fragment)) => return Some(Ok(fragment)),
                Ok(LineOutcome::Done) => break,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        self.finished = true;
        None
    }
}

/// Check the status, then decode `lines` lazily.
///
/// `body` is only used for the error when `status` is not 200; in that case
/// no line is read.
pub fn decode_lines<I, S>(
    status: u16,
    body: &str,
    lines: I,
) -> Result<Fragments<I::IntoIter>, BackendError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if status != StatusCode::OK.as_u16() {
        return Err(BackendError::Transport {
            status,
            body: body.to_string(),
        });
    }
    Ok(Fragments::new(lines.into_iter()))
}

/// Turn a streaming HTTP response into a [`FragmentStream`].
///
/// A non-200 status fails before any of the body is decoded; the error
/// carries the status and the full body text.
pub async fn stream_response(
    response: Response,
    timeout: Option<Duration>,
) -> Result<FragmentStream, BackendError> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        return Err(map_http_status(status, &body));
    }
    Ok(FragmentStream::new(fragment_stream(
        response.bytes_stream(),
        timeout,
    )))
}

/// Decode a raw byte stream into content fragments.
///
/// Lines may be split across chunks at any byte, including inside a
/// multi-byte character. A final line without a trailing newline is still
/// decoded.
pub fn fragment_stream(
    byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    timeout: Option<Duration>,
) -> impl Stream<Item = Result<String, BackendError>> + Send + 'static {
    async_stream::stream! {
        let mut bytes_stream = std::pin::pin!(byte_stream);
        let mut lines = LineBuffer::default();

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    yield Err(map_reqwest_error(e, timeout));
                    return;
                }
            };

            lines.extend(&chunk);

            while let Some(line) = lines.next_line() {
                match decode_raw_line(&line) {
                    Ok(LineOutcome::Skip) => {}
                    Ok(LineOutcome::Fragment(fragment)) => {
                        yield Ok(fragment);
                    }
                    Ok(LineOutcome::Done) => {
                        tracing::debug!("completion stream finished");
                        return;
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(rest) = lines.take_rest() {
            match decode_raw_line(&rest) {
                Ok(LineOutcome::Skip) => {}
                Ok(LineOutcome::Fragment(fragment)) => {
                    yield Ok(fragment);
                }
                Ok(LineOutcome::Done) => {
                    tracing::debug!("completion stream finished");
                    return;
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        tracing::debug!("completion stream ended without [DONE]");
    }
}

/// Splits incoming bytes into `\n`-terminated lines.
///
/// Bytes already searched for a newline are not searched again when more
/// arrive, so a long line delivered in many small chunks is scanned once.
#[derive(Debug, Default)]
struct LineBuffer {
    buf: Vec<u8>,
    /// Prefix of `buf` known to contain no newline.
    scanned: usize,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// The next complete line, without its `\n`.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        match self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                let mut line: Vec<u8> = self.buf.drain(..=end).collect();
                line.pop();
                self.scanned = 0;
                Some(line)
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    /// Whatever follows the last newline, if anything.
    fn take_rest(&mut self) -> Option<Vec<u8>> {
        self.scanned = 0;
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

fn decode_raw_line(line: &[u8]) -> Result<LineOutcome, BackendError> {
    let text = std::str::from_utf8(line)
        .map_err(|e| BackendError::Decode(format!("line is not valid UTF-8: {e}")))?;
    decode_line(text)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
