//! Newline-delimited JSON decoding for streamed flow responses.
//!
//! This module turns the raw fragments of a streaming HTTP body into an
//! ordered sequence of [`StreamEvent`]s. Records are framed by `\n`; the
//! decoder is indifferent to where fragment boundaries fall, including in the
//! middle of a multi-byte UTF-8 sequence.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_PARSE_ERRORS, STREAM_RECORDS};
use crate::types::{ErrorEvent, StreamEvent};
use crate::{Error, Result};

/// Incremental NDJSON decoder.
///
/// Fragments are appended with [`push_str`](Self::push_str) or
/// [`push_bytes`](Self::push_bytes); complete records are pulled with
/// [`next_event`](Self::next_event). A record is only emitted once its
/// terminating newline has arrived, or by [`finish`](Self::finish) at end of
/// stream.
///
/// A record that cannot be decoded becomes a synthetic
/// [`StreamEvent::Error`] whose detail carries the raw record; decoding
/// carries on with the next record.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known to contain no newline.
    scanned: usize,
}

impl StreamDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a text fragment.
    pub fn push_str(&mut self, fragment: &str) {
        self.push_bytes(fragment.as_bytes());
    }

    /// Appends a byte fragment.
    pub fn push_bytes(&mut self, fragment: &[u8]) {
        STREAM_BYTES.count(fragment.len() as u64);
        self.buffer.extend_from_slice(fragment);
    }

    /// Returns the number of buffered bytes not yet emitted.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Extracts the next complete record, if one is buffered.
    pub fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let offset = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == b'\n');
            let Some(offset) = offset else {
                self.scanned = self.buffer.len();
                return None;
            };
            let end = self.scanned + offset;
            let segment: Vec<u8> = self.buffer.drain(..=end).collect();
            self.scanned = 0;
            if let Some(event) = decode_segment(&segment[..end]) {
                return Some(event);
            }
        }
    }

    /// Flushes the trailing partial record at end of stream.
    ///
    /// Call after [`next_event`](Self::next_event) has returned `None`.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        self.scanned = 0;
        let segment = std::mem::take(&mut self.buffer);
        decode_segment(&segment)
    }

    /// Decodes every complete record currently buffered.
    pub fn drain(&mut self) -> Vec<StreamEvent> {
        std::iter::from_fn(|| self.next_event()).collect()
    }
}

/// Decodes one record. Returns `None` for blank lines.
fn decode_segment(segment: &[u8]) -> Option<StreamEvent> {
    let text = match std::str::from_utf8(segment) {
        Ok(text) => text,
        Err(e) => {
            let raw = String::from_utf8_lossy(segment).into_owned();
            return Some(parse_failure(Error::from(e).to_string(), raw));
        }
    };
    let record = text.trim();
    if record.is_empty() {
        return None;
    }
    STREAM_RECORDS.click();
    match StreamEvent::from_record(record) {
        Ok(event) => Some(event),
        Err(e) => Some(parse_failure(
            format!("Failed to parse stream record: {e}"),
            record.to_string(),
        )),
    }
}

fn parse_failure(message: String, raw: String) -> StreamEvent {
    STREAM_PARSE_ERRORS.click();
    tracing::warn!(error = %message, record = %raw, "malformed stream record");
    StreamEvent::Error(ErrorEvent::new(message).with_detail(raw))
}

/// Decode a stream of fragments into a stream of events.
///
/// `Err` items from the fragment source are passed through unchanged; they
/// represent transport failures rather than protocol events. The trailing
/// partial record is flushed when the source ends.
pub fn decode<S, F>(fragments: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = Result<F>> + Unpin,
    F: AsRef<[u8]>,
{
    stream::unfold(
        (fragments, StreamDecoder::new(), false),
        |(mut fragments, mut decoder, finished)| async move {
            if finished {
                return None;
            }
            loop {
                // First check if we have a complete record in the buffer
                if let Some(event) = decoder.next_event() {
                    return Some((Ok(event), (fragments, decoder, false)));
                }

                match fragments.next().await {
                    Some(Ok(fragment)) => decoder.push_bytes(fragment.as_ref()),
                    Some(Err(e)) => return Some((Err(e), (fragments, decoder, false))),
                    None => {
                        return decoder
                            .finish()
                            .map(|event| (Ok(event), (fragments, decoder, true)));
                    }
                }
            }
        },
    )
}

/// Decode a stream of text fragments.
pub fn decode_text<S>(fragments: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    decode(fragments)
}

/// Decode the byte stream of an HTTP response body.
pub fn decode_bytes<S>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });
    decode(stream)
}
