use thiserror::Error;

/// A decoded record that breaks the event stream contract. Callers should treat this as fatal.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ProtocolError {
    #[error("stream record is not a JSON object (found {found})")]
    NotAnObject { found: &'static str },
    #[error("stream record has no usable `Index`")]
    MissingIndex,
    #[error("stream record at index {index} has no `Events` array")]
    MissingEvents { index: u64 },
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("I/O error while reading event stream: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
