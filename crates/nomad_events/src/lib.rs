#![forbid(unsafe_code)]
//! Decode-and-filter core for relaying Nomad event stream notifications.
//!
//! This crate performs no network I/O. It provides:
//! - An incremental NDJSON decoder that rebuilds records from arbitrarily split chunks.
//! - A per-task watermark filter that turns a possibly replayed event feed into an
//!   idempotent stream of notification-worthy task events.
//! - A shared liveness timestamp, plus a watchdog behind the `tokio` feature.
//!
//! [`EventRelay`] ties decoder and filter together. Blocking sources go through
//! [`EventRelay::run`]; async sources pull their own chunks and call [`EventRelay::feed_bytes`].

mod chunk;
mod classify;
mod config;
mod decoder;
mod error;
mod filter;
mod liveness;
mod model;
mod notification;
mod relay;
mod watermark;

pub use chunk::{ChunkReader, Utf8Assembler};
pub use classify::{classify, Criticality};
pub use config::{EventTypeList, FilterConfig};
pub use decoder::{DecoderStats, NdjsonDecoder};
pub use error::{ChunkError, ProtocolError, RelayError};
pub use filter::{filter_task_events, EventFilter, RecordOutcome, TaskBatch};
pub use liveness::Liveness;
pub use model::{
    is_connect_proxy, Allocation, EventEnvelope, TaskEvent, TaskIdentifier, TaskState, UnixNanos,
};
pub use notification::Notification;
pub use relay::{EventRelay, StreamSummary};
pub use watermark::WatermarkTable;

#[cfg(feature = "tokio")]
pub use liveness::Watchdog;
