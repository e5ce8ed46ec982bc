//! Chunk-tolerant frame decoding.
//!
//! The wire is a sequence of `\n`-terminated lines. Lines that start with
//! [`FRAME_MARKER`] carry one payload each; every other line is ignored. A line
//! only becomes a frame once its terminator has been seen, so the decoder keeps
//! one residual fragment between reads.

use std::fmt;

/// Prefix that marks a line as a frame.
pub const FRAME_MARKER: &str = "data:";

const REPLACEMENT: char = '\u{FFFD}';

/// One undecoded frame payload, the text between the marker and the line end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawFrame(String);

impl RawFrame {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn payload(&self) -> &str {
        &self.0
    }

    pub fn into_payload(self) -> String {
        self.0
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental UTF-8 decoder that never mis-decodes a code point split across reads.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Decode as much of `bytes` (prefixed by any retained partial sequence) as possible.
    ///
    /// A trailing incomplete sequence is kept for the next call. Invalid
    /// sequences decode to U+FFFD and are skipped.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return String::new();
        }

        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;

        while consumed < self.pending.len() {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.pending.len();
                }
                Err(error) => {
                    let valid = error.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match error.error_len() {
                        Some(invalid) => {
                            out.push(REPLACEMENT);
                            consumed += valid + invalid;
                        }
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }

    /// Number of bytes held back as an incomplete code point.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop any retained partial sequence, returning how many bytes were discarded.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

/// What was left unconsumed when the stream ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderTail {
    /// Residual line text that never saw its terminator.
    pub residual: String,
    /// Bytes of an incomplete trailing code point.
    pub partial_bytes: usize,
}

impl DecoderTail {
    pub fn is_empty(&self) -> bool {
        self.residual.is_empty() && self.partial_bytes == 0
    }
}

/// Turns successive byte chunks into complete [`RawFrame`]s in arrival order.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8StreamDecoder,
    residual: String,
}

impl FrameDecoder {
    /// Feed one chunk and drain every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        let text = self.utf8.decode(chunk);
        if text.is_empty() {
            return Vec::new();
        }

        // The residual never holds a terminator, so only the new text needs scanning.
        let scan_from = self.residual.len();
        self.residual.push_str(&text);

        let Some(last_newline) = self.residual[scan_from..]
            .rfind('\n')
            .map(|offset| scan_from + offset)
        else {
            return Vec::new();
        };

        let tail = self.residual.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.residual, tail);

        complete
            .split_terminator('\n')
            .filter_map(extract_payload)
            .map(RawFrame::new)
            .collect()
    }

    /// Declare end-of-stream. Whatever is still buffered is discarded, never yielded.
    pub fn finish(&mut self) -> DecoderTail {
        DecoderTail {
            residual: std::mem::take(&mut self.residual),
            partial_bytes: self.utf8.finish(),
        }
    }

    /// Text received after the last line terminator.
    pub fn residual(&self) -> &str {
        &self.residual
    }

    pub fn is_idle(&self) -> bool {
        self.residual.is_empty() && self.utf8.pending_len() == 0
    }

    /// Decode a complete stream body in one shot.
    pub fn decode_all(input: &str) -> Vec<RawFrame> {
        let mut decoder = Self::default();
        let frames = decoder.feed(input.as_bytes());
        decoder.finish();
        frames
    }
}

fn extract_payload(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(FRAME_MARKER)?.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameDecoder, RawFrame, Utf8StreamDecoder};

    fn payloads(frames: &[RawFrame]) -> Vec<&str> {
        frames.iter().map(RawFrame::payload).collect()
    }

    #[test]
    fn split_payload_is_yielded_once_terminated() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.feed(b"data:{\"content\":\"Hel").is_empty());
        let frames = decoder.feed(b"lo\"}\n");
        assert_eq!(payloads(&frames), vec![r#"{"content":"Hello"}"#]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn non_marker_lines_and_keep_alives_are_skipped() {
        let frames = FrameDecoder::decode_all(concat!(
            ": comment\n",
            "event: message\n",
            "data:\n",
            "data:   \n",
            "\n",
            "data: {\"content\":\"x\"}\n",
        ));
        assert_eq!(payloads(&frames), vec![r#"{"content":"x"}"#]);
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        let frames = FrameDecoder::decode_all("data:{\"a\":1}\r\ndata:{\"b\":2}\r\n");
        assert_eq!(payloads(&frames), vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn unterminated_marker_line_is_never_yielded() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.feed(b"data:{\"content\":\"done\"}").is_empty());
        assert_eq!(decoder.residual(), "data:{\"content\":\"done\"}");
        let tail = decoder.finish();
        assert_eq!(tail.residual, "data:{\"content\":\"done\"}");
        assert!(decoder.is_idle());
    }

    #[test]
    fn zero_length_chunks_are_no_ops() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.feed(b"").is_empty());
        assert!(decoder.feed(b"data:x").is_empty());
        assert!(decoder.feed(b"").is_empty());
        assert_eq!(payloads(&decoder.feed(b"\n")), vec!["x"]);
    }

    #[test]
    fn utf8_decoder_holds_split_code_points() {
        let bytes = "héllo 🌍".as_bytes();
        let mut decoder = Utf8StreamDecoder::default();
        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(out, "héllo 🌍");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn utf8_decoder_replaces_invalid_bytes_without_stalling() {
        let mut decoder = Utf8StreamDecoder::default();
        let out = decoder.decode(b"a\xFFb");
        assert_eq!(out, "a\u{FFFD}b");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn utf8_finish_reports_dropped_partial_bytes() {
        let mut decoder = Utf8StreamDecoder::default();
        let euro = "€".as_bytes();
        assert_eq!(decoder.decode(&euro[..2]), "");
        assert_eq!(decoder.finish(), 2);
        assert_eq!(decoder.pending_len(), 0);
    }
}
