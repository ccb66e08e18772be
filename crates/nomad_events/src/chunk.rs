use std::io::Read;

use crate::error::ChunkError;

const CHUNK_SIZE_BYTES: usize = 8192;

/// Converts byte chunks to text without splitting a multi-byte character across calls.
#[derive(Debug, Clone, Default)]
pub struct Utf8Assembler {
    carry: Vec<u8>,
    invalid_sequences: u64,
}

impl Utf8Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the decodable prefix of `carry + bytes` and keeps an incomplete
    /// trailing sequence for the next call. Invalid sequences become U+FFFD.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        let joined;
        let mut rest: &[u8] = if self.carry.is_empty() {
            bytes
        } else {
            let mut buf = std::mem::take(&mut self.carry);
            buf.extend_from_slice(bytes);
            joined = buf;
            &joined
        };

        let mut out = String::with_capacity(rest.len());
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match err.error_len() {
                        Some(len) => {
                            self.invalid_sequences += 1;
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            self.carry = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    pub fn carried_bytes(&self) -> usize {
        self.carry.len()
    }

    pub fn invalid_sequences(&self) -> u64 {
        self.invalid_sequences
    }
}

/// Iterates a blocking reader as UTF-8 text chunks of arbitrary size.
///
/// Backs [`EventRelay::run`](crate::EventRelay::run); usable on its own to feed an [`NdjsonDecoder`](crate::NdjsonDecoder).
pub struct ChunkReader<R: Read> {
    reader: R,
    buffer: [u8; CHUNK_SIZE_BYTES],
    utf8: Utf8Assembler,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: [0u8; CHUNK_SIZE_BYTES],
            utf8: Utf8Assembler::new(),
            done: false,
        }
    }

    pub fn invalid_sequences(&self) -> u64 {
        self.utf8.invalid_sequences()
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<String, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.reader.read(&mut self.buffer) {
                Ok(0) => {
                    self.done = true;
                    if self.utf8.carried_bytes() > 0 {
                        tracing::debug!(
                            carried_bytes = self.utf8.carried_bytes(),
                            "event stream ended inside a UTF-8 sequence"
                        );
                    }
                    return None;
                }
                Ok(n) => {
                    let text = self.utf8.push(&self.buffer[..n]);
                    if text.is_empty() {
                        continue;
                    }
                    return Some(Ok(text));
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(ChunkError::Io(err)));
                }
            }
        }
    }
}
