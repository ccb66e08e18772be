use serde_json::Value;

use crate::chunk::Utf8Assembler;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DecoderStats {
    pub lines_completed: u64,
    pub records_decoded: u64,
    pub lines_dropped: u64,
}

/// Reassembles newline-delimited JSON records from arbitrarily split chunks.
///
/// Framing is purely line-oriented: the decoder does not track brackets or quotes,
/// so it relies on the producer never emitting a raw newline inside a JSON string.
/// Nomad escapes newlines in its event stream, which keeps this contract intact.
///
/// - Only newline-terminated lines are parsed; the unterminated tail is kept in
///   [`pending`](Self::pending) and prefixed to the next chunk.
/// - Whitespace-only lines are skipped.
/// - A terminated line that is not valid JSON is dropped, counted in
///   [`DecoderStats::lines_dropped`], and logged.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    pending: String,
    utf8: Utf8Assembler,
    stats: DecoderStats,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &str) -> Vec<Value> {
        let Some(last_newline) = chunk.rfind('\n') else {
            self.pending.push_str(chunk);
            return Vec::new();
        };

        self.pending.push_str(&chunk[..last_newline]);
        let complete = std::mem::replace(&mut self.pending, chunk[last_newline + 1..].to_string());

        let mut records = Vec::new();
        for line in complete.split('\n') {
            if let Some(value) = self.parse_line(line) {
                records.push(value);
            }
        }
        records
    }

    /// Like [`decode`](Self::decode), but accepts raw bytes that may end mid-character.
    pub fn decode_bytes(&mut self, chunk: &[u8]) -> Vec<Value> {
        let text = self.utf8.push(chunk);
        self.decode(&text)
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn invalid_utf8_sequences(&self) -> u64 {
        self.utf8.invalid_sequences()
    }

    /// Discards any buffered fragment.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.utf8 = Utf8Assembler::default();
    }

    fn parse_line(&mut self, line: &str) -> Option<Value> {
        if line.chars().all(|ch| ch.is_whitespace()) {
            return None;
        }
        self.stats.lines_completed += 1;
        match serde_json::from_str::<Value>(line) {
            Ok(value) => {
                self.stats.records_decoded += 1;
                Some(value)
            }
            Err(err) => {
                self.stats.lines_dropped += 1;
                tracing::warn!(
                    error = %err,
                    line_bytes = line.len(),
                    dropped_total = self.stats.lines_dropped,
                    "dropping event stream line that is not valid JSON"
                );
                None
            }
        }
    }
}
