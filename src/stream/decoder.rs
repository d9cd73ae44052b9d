//! Incremental text and line decoding for chunked response bodies.
//!
//! HTTP bodies arrive in chunks whose boundaries carry no meaning: a chunk
//! can end in the middle of a line or in the middle of a multi-byte UTF-8
//! character. The types here keep the carry-over state so that callers only
//! ever see whole characters and whole lines.

use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

/// Literal prefix of a record line in the search progress stream.
pub const DATA_PREFIX: &str = "data: ";

/// Streaming UTF-8 decoder.
///
/// Bytes of a character split across two chunks are held back until the
/// rest of the character arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    /// Creates a decoder with no carried-over bytes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one chunk, continuing any character left open by the previous one.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        if chunk.is_empty() {
            return String::new();
        }

        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(invalid_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[invalid_len..];
                        }
                        None => {
                            // Incomplete character at the end of the chunk.
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Number of bytes held back waiting for the rest of a character.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Splits decoded text into complete lines.
///
/// `\n`, `\r\n` and a bare `\r` all end a line. The fragment after the last
/// terminator is retained until a later chunk terminates it; a `\r\n` pair
/// split across two chunks still ends exactly one line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    text: Utf8ChunkDecoder,
    buffer: String,
    after_cr: bool,
}

impl LineBuffer {
    /// Creates an empty line buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let decoded = self.text.decode(chunk);
        let mut lines = Vec::new();
        for ch in decoded.chars() {
            if std::mem::take(&mut self.after_cr) && ch == '\n' {
                continue;
            }
            match ch {
                '\n' => lines.push(std::mem::take(&mut self.buffer)),
                '\r' => {
                    lines.push(std::mem::take(&mut self.buffer));
                    self.after_cr = true;
                }
                _ => self.buffer.push(ch),
            }
        }
        lines
    }

    /// The unterminated fragment currently held.
    #[must_use]
    pub fn partial(&self) -> &str {
        &self.buffer
    }

    /// Drops the unterminated fragment at end of stream and returns its length.
    ///
    /// A line without its terminator can never be a complete record.
    pub fn discard_partial(&mut self) -> usize {
        let discarded = self.buffer.len() + self.text.pending_len();
        self.buffer.clear();
        self.after_cr = false;
        self.text = Utf8ChunkDecoder::new();
        discarded
    }
}

/// Decodes `data: <json>` lines into typed records.
#[derive(Debug, Default)]
pub struct DataLineDecoder {
    lines: LineBuffer,
    skipped: usize,
}

impl DataLineDecoder {
    /// Creates a decoder with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the JSON payloads of every `data:` line completed by `chunk`.
    ///
    /// Lines without the prefix (comments, keep-alives, blank separators)
    /// are ignored.
    pub fn push_payloads(&mut self, chunk: &[u8]) -> Vec<String> {
        self.lines
            .push(chunk)
            .into_iter()
            .filter_map(|line| match line.strip_prefix(DATA_PREFIX) {
                Some(payload) => Some(payload.to_string()),
                None => {
                    if !line.is_empty() {
                        trace!(line = %line, "ignoring non-data line");
                    }
                    None
                }
            })
            .collect()
    }

    /// Decodes every record completed by `chunk`.
    ///
    /// A payload that fails to parse is logged and skipped; the stream is
    /// never aborted by a malformed record.
    pub fn push<T: DeserializeOwned>(&mut self, chunk: &[u8]) -> Vec<T> {
        self.push_payloads(chunk)
            .into_iter()
            .filter_map(|payload| match serde_json::from_str::<T>(&payload) {
                Ok(record) => Some(record),
                Err(error) => {
                    self.skipped += 1;
                    warn!(error = %error, payload_len = payload.len(), "skipping malformed stream record");
                    None
                }
            })
            .collect()
    }

    /// Signals end of stream. Any unterminated line is dropped.
    pub fn finish(&mut self) {
        let discarded = self.lines.discard_partial();
        if discarded > 0 {
            debug!(bytes = discarded, "discarding unterminated trailing line");
        }
    }

    /// Number of malformed records skipped so far.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Rec {
        n: u32,
        s: String,
    }

    fn encoded(records: &[(u32, &str)]) -> Vec<u8> {
        let mut out = String::new();
        for (n, s) in records {
            out.push_str(&format!("data: {{\"n\":{n},\"s\":\"{s}\"}}\n"));
        }
        out.into_bytes()
    }

    fn decode_in_chunks(bytes: &[u8], sizes: &[usize]) -> Vec<Rec> {
        let mut decoder = DataLineDecoder::new();
        let mut out = Vec::new();
        let mut offset = 0;
        let mut size_iter = sizes.iter().cycle();
        while offset < bytes.len() {
            let size = (*size_iter.next().unwrap()).max(1);
            let end = (offset + size).min(bytes.len());
            out.extend(decoder.push::<Rec>(&bytes[offset..end]));
            offset = end;
        }
        decoder.finish();
        out
    }

    // ==================== Utf8ChunkDecoder ====================

    #[test]
    fn test_utf8_decoder_joins_character_split_across_chunks() {
        let bytes = "héllo".as_bytes();
        let mut decoder = Utf8ChunkDecoder::new();
        // 'é' is two bytes starting at index 1
        let first = decoder.decode(&bytes[..2]);
        assert_eq!(first, "h");
        assert_eq!(decoder.pending_len(), 1);
        let second = decoder.decode(&bytes[2..]);
        assert_eq!(second, "éllo");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_utf8_decoder_replaces_invalid_sequence() {
        let mut decoder = Utf8ChunkDecoder::new();
        let out = decoder.decode(&[b'a', 0xFF, b'b']);
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn test_utf8_decoder_empty_chunk_is_noop() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[]), "");
        assert_eq!(decoder.pending_len(), 0);
    }

    // ==================== LineBuffer ====================

    #[test]
    fn test_line_buffer_retains_partial_line() {
        let mut lines = LineBuffer::new();
        assert!(lines.push(b"abc").is_empty());
        assert_eq!(lines.partial(), "abc");
        assert_eq!(lines.push(b"def\nxy"), vec!["abcdef".to_string()]);
        assert_eq!(lines.partial(), "xy");
    }

    #[test]
    fn test_line_buffer_emits_multiple_lines_in_order() {
        let mut lines = LineBuffer::new();
        let out = lines.push(b"one\ntwo\r\n\nthree\n");
        assert_eq!(out, vec!["one", "two", "", "three"]);
        assert_eq!(lines.partial(), "");
    }

    #[test]
    fn test_line_buffer_splits_on_bare_carriage_return() {
        let mut lines = LineBuffer::new();
        let out = lines.push(b"event: a\rdata: 1\r\rtail");
        assert_eq!(out, vec!["event: a", "data: 1", ""]);
        assert_eq!(lines.partial(), "tail");
    }

    #[test]
    fn test_line_buffer_crlf_split_across_chunks_ends_one_line() {
        let mut lines = LineBuffer::new();
        assert_eq!(lines.push(b"data: 1\r"), vec!["data: 1"]);
        assert_eq!(lines.push(b"\ndata: 2\n"), vec!["data: 2"]);
        assert_eq!(lines.push(b"\r\n"), vec![""]);
    }

    #[test]
    fn test_line_buffer_discard_partial_reports_length() {
        let mut lines = LineBuffer::new();
        lines.push(b"done\nleft");
        assert_eq!(lines.discard_partial(), 4);
        assert_eq!(lines.partial(), "");
    }

    // ==================== DataLineDecoder ====================

    #[test]
    fn test_data_decoder_single_chunk() {
        let bytes = encoded(&[(1, "a"), (2, "b"), (3, "c")]);
        let mut decoder = DataLineDecoder::new();
        let records: Vec<Rec> = decoder.push(&bytes);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2], Rec { n: 3, s: "c".into() });
    }

    #[test]
    fn test_data_decoder_chunk_boundary_invariance() {
        let bytes = encoded(&[(1, "ünïcødé"), (2, "日本語"), (3, "plain"), (4, "ß")]);
        let whole = decode_in_chunks(&bytes, &[bytes.len()]);
        assert_eq!(whole.len(), 4);

        for sizes in [&[1][..], &[2], &[3], &[5, 1, 7], &[13, 2], &[64]] {
            let chunked = decode_in_chunks(&bytes, sizes);
            assert_eq!(chunked, whole, "chunk sizes {sizes:?} changed the output");
        }
    }

    #[test]
    fn test_data_decoder_no_duplication_or_loss_across_chunks() {
        let records: Vec<(u32, String)> = (0..50).map(|i| (i, format!("r{i}"))).collect();
        let refs: Vec<(u32, &str)> = records.iter().map(|(n, s)| (*n, s.as_str())).collect();
        let bytes = encoded(&refs);

        let decoded = decode_in_chunks(&bytes, &[7, 19, 3]);
        assert_eq!(decoded.len(), 50);
        for (i, rec) in decoded.iter().enumerate() {
            assert_eq!(rec.n as usize, i);
        }
    }

    #[test]
    fn test_data_decoder_skips_malformed_line_and_continues() {
        let mut bytes = encoded(&[(1, "a")]);
        bytes.extend_from_slice(b"data: {not json}\n");
        bytes.extend_from_slice(&encoded(&[(2, "b")]));

        let mut decoder = DataLineDecoder::new();
        let records: Vec<Rec> = decoder.push(&bytes);
        assert_eq!(records.iter().map(|r| r.n).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(decoder.skipped(), 1);
    }

    #[test]
    fn test_data_decoder_ignores_comments_and_unprefixed_lines() {
        let mut decoder = DataLineDecoder::new();
        let records: Vec<Rec> =
            decoder.push(b": keep-alive\nevent: ping\n\ndata:{\"n\":9,\"s\":\"x\"}\ndata: {\"n\":1,\"s\":\"y\"}\n");
        // "data:" without the trailing space is not the record prefix
        assert_eq!(records, vec![Rec { n: 1, s: "y".into() }]);
    }

    #[test]
    fn test_data_decoder_discards_unterminated_trailing_record() {
        let mut decoder = DataLineDecoder::new();
        let records: Vec<Rec> = decoder.push(b"data: {\"n\":1,\"s\":\"a\"}\ndata: {\"n\":2,\"s\":\"b\"}");
        assert_eq!(records.len(), 1);
        decoder.finish();
        let after: Vec<Rec> = decoder.push(b"\n");
        assert!(after.is_empty());
    }

    #[test]
    fn test_data_decoder_empty_chunk_is_noop() {
        let mut decoder = DataLineDecoder::new();
        let records: Vec<Rec> = decoder.push(b"");
        assert!(records.is_empty());
    }
}
