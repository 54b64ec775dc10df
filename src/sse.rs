//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! The model API answers `streamGenerateContent?alt=sse` with one JSON
//! `GenerateContentResponse` per event.  This module turns the raw byte stream
//! into a stream of parsed responses.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS};
use crate::types::GenerateContentResponse;
use crate::{Error, Result};

/// Process a stream of bytes into a stream of server-sent events.
///
/// Events are delimited by a blank line (`\n\n` or `\r\n\r\n`).  The `data:`
/// lines of an event are joined and parsed as JSON; comments and other fields
/// are ignored.  A `[DONE]` event ends the stream.  A transport failure is
/// yielded once and ends the stream; a malformed event is yielded as an error
/// and parsing continues.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    stream::unfold(SseState::new(stream), |mut state| async move {
        loop {
            if state.finished {
                return None;
            }
            while let Some(frame) = take_frame(&mut state.buffer) {
                match frame {
                    Frame::Empty => continue,
                    Frame::Done => return None,
                    Frame::Data(data) => return Some((parse_event(&data), state)),
                }
            }
            if state.eof {
                let err = state.trailing_error.take()?;
                state.finished = true;
                return Some((Err(err), state));
            }
            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    if let Err(err) = state.push_bytes(&bytes) {
                        STREAM_ERRORS.click();
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                }
                Some(Err(err)) => {
                    STREAM_ERRORS.click();
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => state.finish_input(),
            }
        }
    })
}

struct SseState<S> {
    stream: S,
    buffer: String,
    pending: Vec<u8>,
    trailing_error: Option<Error>,
    eof: bool,
    finished: bool,
}

impl<S> SseState<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: String::new(),
            pending: Vec::new(),
            trailing_error: None,
            eof: false,
            finished: false,
        }
    }

    /// Append bytes, holding back a multi-byte character split across chunks.
    fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(Error::encoding(
                    format!("Invalid UTF-8 in stream: {e}"),
                    Some(Box::new(e)),
                ));
            }
        };
        let rest = self.pending.split_off(valid);
        let text = String::from_utf8_lossy(&self.pending);
        self.buffer.push_str(&text);
        self.pending = rest;
        // A trailing '\r' may be the first half of a "\r\n".
        let held = self.buffer.ends_with('\r');
        if held {
            self.buffer.pop();
        }
        self.normalize_line_endings();
        if held {
            self.buffer.push('\r');
        }
        Ok(())
    }

    /// Mark the end of input and flush a final event that was not followed by
    /// a blank line.  Leftover bytes of an incomplete character are reported
    /// after the buffered events.
    fn finish_input(&mut self) {
        self.eof = true;
        if !self.pending.is_empty() {
            STREAM_ERRORS.click();
            self.trailing_error = Some(Error::encoding(
                format!(
                    "stream ended inside a UTF-8 sequence ({} byte(s) left)",
                    self.pending.len()
                ),
                None,
            ));
            self.pending.clear();
        }
        if self.buffer.ends_with('\r') {
            self.buffer.pop();
            self.buffer.push('\n');
        }
        self.normalize_line_endings();
        if !self.buffer.trim().is_empty() {
            self.buffer.push_str("\n\n");
        }
    }

    fn normalize_line_endings(&mut self) {
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Data(String),
    Done,
    Empty,
}

/// Remove the next complete event from `buffer`.
fn take_frame(buffer: &mut String) -> Option<Frame> {
    let end = buffer.find("\n\n")?;
    let frame: String = buffer.drain(..end + 2).collect();
    let data: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    if data.is_empty() {
        return Some(Frame::Empty);
    }
    let data = data.join("\n");
    if data.trim() == "[DONE]" {
        Some(Frame::Done)
    } else {
        Some(Frame::Data(data))
    }
}

/// Parse one event's data into a response, surfacing in-stream failures.
fn parse_event(data: &str) -> Result<GenerateContentResponse> {
    let response: GenerateContentResponse = serde_json::from_str(data).map_err(|e| {
        STREAM_ERRORS.click();
        Error::serialization(
            format!("Malformed SSE event: {e} in '{data}'"),
            Some(Box::new(e)),
        )
    })?;
    if let Some(error) = &response.error {
        STREAM_ERRORS.click();
        return Err(Error::api(
            error.code,
            error.status.clone(),
            error.message.clone(),
        ));
    }
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_ref())
    {
        return Err(Error::bad_request(format!("prompt blocked: {reason}")));
    }
    Ok(response)
}
