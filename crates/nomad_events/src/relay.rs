use std::io::Read;

use serde_json::Value;

use crate::chunk::ChunkReader;
use crate::decoder::NdjsonDecoder;
use crate::error::{ProtocolError, RelayError};
use crate::filter::{EventFilter, RecordOutcome};
use crate::notification::Notification;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct StreamSummary {
    pub records: u64,
    pub heartbeats: u64,
    pub replays: u64,
    pub notifications: u64,
    pub dropped_lines: u64,
    /// Bytes of an unterminated final line still buffered when the stream ended.
    pub dangling_bytes: usize,
}

/// Decode-then-filter pipeline: raw chunks in, notifications out.
///
/// Each chunk is decoded and every resulting record filtered before `feed` returns.
#[derive(Debug)]
pub struct EventRelay {
    decoder: NdjsonDecoder,
    filter: EventFilter,
    summary: StreamSummary,
}

impl EventRelay {
    pub fn new(filter: EventFilter) -> Self {
        Self {
            decoder: NdjsonDecoder::new(),
            filter,
            summary: StreamSummary::default(),
        }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    pub fn decoder(&self) -> &NdjsonDecoder {
        &self.decoder
    }

    pub fn into_filter(self) -> EventFilter {
        self.filter
    }

    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            dropped_lines: self.decoder.stats().lines_dropped,
            dangling_bytes: self.decoder.pending().len(),
            ..self.summary
        }
    }

    pub fn feed(&mut self, chunk: &str) -> Result<Vec<Notification>, ProtocolError> {
        let records = self.decoder.decode(chunk);
        self.filter_records(records)
    }

    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Result<Vec<Notification>, ProtocolError> {
        let records = self.decoder.decode_bytes(chunk);
        self.filter_records(records)
    }

    /// Drives a blocking reader until it ends, handing each notification to `on_notification`.
    ///
    /// This is the synchronous entry point for callers that own a [`Read`] (a file, a socket,
    /// a blocking HTTP body). Async callers pull chunks themselves and use [`feed_bytes`](Self::feed_bytes).
    pub fn run<R, F>(&mut self, reader: R, mut on_notification: F) -> Result<StreamSummary, RelayError>
    where
        R: Read,
        F: FnMut(Notification),
    {
        for chunk in ChunkReader::new(reader) {
            let chunk = chunk?;
            for notification in self.feed(&chunk)? {
                on_notification(notification);
            }
        }

        let summary = self.summary();
        if summary.dangling_bytes > 0 {
            tracing::debug!(
                dangling_bytes = summary.dangling_bytes,
                "event stream ended with an unterminated line"
            );
        }
        Ok(summary)
    }

    fn filter_records(&mut self, records: Vec<Value>) -> Result<Vec<Notification>, ProtocolError> {
        let mut out = Vec::new();
        for record in records {
            self.summary.records += 1;
            match self.filter.process(&record)? {
                RecordOutcome::Heartbeat => self.summary.heartbeats += 1,
                RecordOutcome::Replay { .. } => self.summary.replays += 1,
                RecordOutcome::Notifications(notifications) => {
                    self.summary.notifications += notifications.len() as u64;
                    out.extend(notifications);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::config::FilterConfig;
    use crate::model::UnixNanos;

    fn relay(starting_index: u64) -> EventRelay {
        EventRelay::new(EventFilter::new(
            FilterConfig::default(),
            starting_index,
            UnixNanos(100),
        ))
    }

    const ALLOC_LINE: &str = concat!(
        r#"{"Index":7,"Events":[{"Topic":"Allocation","Payload":{"Allocation":{"#,
        r#""Namespace":"default","JobID":"api","NodeName":"n1","TaskStates":{"#,
        r#""app":{"Events":[{"Type":"Started","Time":200,"DisplayMessage":"Task started"}]}}}}}]}"#,
        "\n"
    );

    #[test]
    fn feed_decodes_and_filters_in_one_step() {
        let mut relay = relay(0);
        let (head, tail) = ALLOC_LINE.split_at(40);
        assert!(relay.feed(head).unwrap().is_empty());
        let notes = relay.feed(tail).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].display_message, "Task started");
        assert_eq!(relay.summary().records, 1);
    }

    #[test]
    fn run_counts_heartbeats_and_replays() {
        let input = format!("{{}}\n{}{{}}\n{{\"Index\":3,\"Events\":[]}}\n{{\"Ind", ALLOC_LINE);
        let mut relay = relay(5);
        let mut seen = Vec::new();
        let summary = relay
            .run(Cursor::new(input.into_bytes()), |note| seen.push(note))
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            summary,
            StreamSummary {
                records: 4,
                heartbeats: 2,
                replays: 1,
                notifications: 1,
                dropped_lines: 0,
                dangling_bytes: 5,
            }
        );
    }

    #[test]
    fn protocol_violation_stops_the_run() {
        let mut relay = relay(0);
        let err = relay
            .run(Cursor::new(b"{\"Index\":9}\n".to_vec()), |_| {})
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::Protocol(ProtocolError::MissingEvents { index: 9 })
        ));
    }
}
