//! # Server-Sent Event Framing
//!
//! Incremental `text/event-stream` parser. Body chunks arrive with arbitrary
//! boundaries, so bytes are buffered until a full line is available and
//! fields are accumulated until the blank line that ends a frame.

use std::collections::VecDeque;

use futures_util::stream::{self, Stream, StreamExt};

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the last `event:` field, if any.
    pub event: Option<String>,
    /// All `data:` lines of the frame joined with `\n`.
    pub data: String,
    /// Last seen `id:` value.
    pub id: Option<String>,
}

impl SseFrame {
    /// Event type, defaulting to `message` like browsers do.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Longest line kept by default; anything longer is logged and dropped.
pub const MAX_LINE_BYTES: usize = 1 << 20;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Line-oriented SSE decoder. Feed it raw body bytes, get complete frames back.
///
/// Lines end at `\r\n`, `\r` or `\n`, also when a `\r\n` pair is split
/// across two chunks. A UTF-8 byte order mark at the very start is skipped.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known to hold no line terminator.
    scanned: usize,
    pending_cr: bool,
    bom_checked: bool,
    // The rest of an oversized line is still to be skipped.
    discarding: bool,
    max_line: usize,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    /// Fresh decoder with nothing buffered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder dropping lines longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            pending_cr: false,
            bom_checked: false,
            discarding: false,
            max_line,
            event: None,
            data: Vec::new(),
            last_id: None,
        }
    }

    /// Consumes a chunk and returns every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        if !self.bom_checked {
            if self.buffer.starts_with(BOM) {
                self.buffer.drain(..BOM.len());
            } else if BOM.starts_with(&self.buffer) {
                // Possibly a BOM split across chunks.
                return frames;
            }
            self.bom_checked = true;
        }

        loop {
            if self.pending_cr {
                match self.buffer.first() {
                    None => break,
                    Some(b'\n') => {
                        self.buffer.remove(0);
                    }
                    Some(_) => {}
                }
                self.pending_cr = false;
            }

            let terminator = self.buffer[self.scanned..]
                .iter()
                .position(|byte| *byte == b'\n' || *byte == b'\r');
            let Some(offset) = terminator else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_line {
                    log::warn!("Dropping SSE line longer than {} bytes", self.max_line);
                    self.buffer.clear();
                    self.scanned = 0;
                    self.discarding = true;
                }
                break;
            };

            let end = self.scanned + offset;
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            self.scanned = 0;
            if line.pop() == Some(b'\r') {
                self.pending_cr = true;
            }

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_line {
                log::warn!("Dropping SSE line longer than {} bytes", self.max_line);
                continue;
            }

            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment / keep-alive line.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.last_id.clone(),
        })
    }
}

/// Turns a stream of body chunks into a stream of frames.
///
/// A transport error is passed through once and ends the stream. A trailing
/// frame without its terminating blank line is dropped.
pub fn frames<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseFrame, E>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    let ready: VecDeque<SseFrame> = VecDeque::new();
    stream::unfold(
        (bytes, SseDecoder::new(), ready, false),
        |(mut bytes, mut decoder, mut ready, failed)| async move {
            loop {
                if let Some(frame) = ready.pop_front() {
                    return Some((Ok(frame), (bytes, decoder, ready, failed)));
                }
                if failed {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => ready.extend(decoder.feed(chunk.as_ref())),
                    Some(Err(e)) => return Some((Err(e), (bytes, decoder, ready, true))),
                    None => return None,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: SignalizedLane").is_empty());
        assert!(decoder.feed(b"GroupState\r\ndata: [[").is_empty());
        let frames = decoder.feed(b"]]\r\n\r\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type(), "SignalizedLaneGroupState");
        assert_eq!(frames[0].data, "[[]]");
    }

    #[test]
    fn multi_line_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b": keep-alive\n\ndata: first\ndata:second\nid: 7\n\ndata: third\n\n");

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event_type(), "message");
        assert_eq!(frames[0].data, "first\nsecond");
        assert_eq!(frames[0].id.as_deref(), Some("7"));
        assert_eq!(frames[1].data, "third");
        assert_eq!(frames[1].id.as_deref(), Some("7"));
    }

    #[test]
    fn event_type_does_not_leak_into_next_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"event: Heartbeat\n\ndata: x\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn bare_carriage_returns_end_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: SignalizedLaneGroupState\r").is_empty());
        assert!(decoder.feed(b"data: [[]]\r").is_empty());
        let frames = decoder.feed(b"\r");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type(), "SignalizedLaneGroupState");
        assert_eq!(frames[0].data, "[[]]");

        let frames = SseDecoder::new().feed(b"event: X\rdata: [[]]\r\r");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type(), "X");
    }

    #[test]
    fn crlf_split_across_chunks_is_one_line_break() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: a\r").is_empty());
        let frames = decoder.feed(b"\ndata: b\r\n\r\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "a\nb");
    }

    #[test]
    fn leading_byte_order_mark_is_skipped() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\xEF\xBB").is_empty());
        let frames = decoder.feed(b"\xBFevent: SignalizedLaneGroupState\ndata: x\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("SignalizedLaneGroupState"));
    }

    #[test]
    fn oversized_lines_are_dropped() {
        let mut decoder = SseDecoder::with_max_line(16);
        assert!(decoder.feed(b"data: 0123456789abcdef").is_empty());
        assert!(decoder.feed(b"ghij\n\n").is_empty());
        assert!(decoder.feed(b"data: 0123456789abcdefXYZ\n\n").is_empty());

        let frames = decoder.feed(b"data: ok\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "ok");
    }

    #[tokio::test]
    async fn frames_stream_stops_after_transport_error() {
        let chunks: Vec<Result<&[u8], String>> = vec![
            Ok(b"data: a\n\n".as_slice()),
            Err("reset".to_string()),
            Ok(b"data: b\n\n".as_slice()),
        ];
        let items: Vec<_> = frames(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().data, "a");
        assert_eq!(items[1].as_ref().unwrap_err(), "reset");
    }

    #[tokio::test]
    async fn unterminated_trailing_frame_is_dropped() {
        let chunks: Vec<Result<&[u8], String>> = vec![Ok(b"data: a\n\ndata: partial".as_slice())];
        let items: Vec<_> = frames(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 1);
    }
}
