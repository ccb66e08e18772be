use serde_json::Value;

use crate::classify::classify;
use crate::config::FilterConfig;
use crate::error::{json_kind, ProtocolError};
use crate::liveness::Liveness;
use crate::model::{
    is_connect_proxy, Allocation, EventEnvelope, TaskEvent, TaskIdentifier, TaskState, UnixNanos,
};
use crate::notification::Notification;
use crate::watermark::WatermarkTable;

/// What a single stream record amounted to after filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Heartbeat,
    /// The record predates the starting index and was ignored wholesale.
    Replay { index: u64 },
    Notifications(Vec<Notification>),
}

impl RecordOutcome {
    pub fn into_notifications(self) -> Vec<Notification> {
        match self {
            Self::Notifications(notifications) => notifications,
            Self::Heartbeat | Self::Replay { .. } => Vec::new(),
        }
    }
}

/// Result of scanning one task's events against its cached watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskBatch {
    /// Newest timestamp among *all* scanned events, filtered or not.
    pub batch_max: Option<UnixNanos>,
    pub emitted: Vec<TaskEvent>,
}

/// Scans events in arrival order, keeping those newer than `cached` that pass the type lists.
pub fn filter_task_events<I>(events: I, cached: UnixNanos, config: &FilterConfig) -> TaskBatch
where
    I: IntoIterator<Item = TaskEvent>,
{
    let mut batch_max: Option<UnixNanos> = None;
    let mut emitted = Vec::new();

    for event in events {
        batch_max = Some(batch_max.map_or(event.time, |max| max.max(event.time)));

        if event.time <= cached {
            continue;
        }
        if !config.permits(&event.event_type) {
            continue;
        }
        emitted.push(event);
    }

    TaskBatch { batch_max, emitted }
}

/// Turns decoded stream records into notifications, deduplicating by per-task watermark.
#[derive(Debug, Clone)]
pub struct EventFilter {
    config: FilterConfig,
    starting_index: u64,
    watermarks: WatermarkTable,
    liveness: Option<Liveness>,
}

impl EventFilter {
    pub fn new(config: FilterConfig, starting_index: u64, process_start: UnixNanos) -> Self {
        Self {
            config,
            starting_index,
            watermarks: WatermarkTable::new(process_start),
            liveness: None,
        }
    }

    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = Some(liveness);
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn starting_index(&self) -> u64 {
        self.starting_index
    }

    pub fn watermarks(&self) -> &WatermarkTable {
        &self.watermarks
    }

    pub fn process(&mut self, record: &Value) -> Result<RecordOutcome, ProtocolError> {
        let Some(fields) = record.as_object() else {
            return Err(ProtocolError::NotAnObject {
                found: json_kind(record),
            });
        };

        if fields.is_empty() {
            if let Some(liveness) = &self.liveness {
                liveness.touch();
            }
            tracing::debug!("heartbeat");
            return Ok(RecordOutcome::Heartbeat);
        }

        let index = fields
            .get("Index")
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::MissingIndex)?;
        if index <= self.starting_index {
            tracing::debug!(index, starting_index = self.starting_index, "skipping replayed record");
            return Ok(RecordOutcome::Replay { index });
        }

        let envelopes = fields
            .get("Events")
            .and_then(Value::as_array)
            .ok_or(ProtocolError::MissingEvents { index })?;

        let mut notifications = Vec::new();
        for raw in envelopes {
            let envelope = match EventEnvelope::deserialize_lenient(raw) {
                Some(envelope) if envelope.is_allocation() => envelope,
                _ => continue,
            };
            let Some(allocation) = envelope.allocation() else {
                tracing::debug!(index, "allocation event without a usable payload");
                continue;
            };
            let Some(task_states) = &allocation.task_states else {
                tracing::debug!(index, job_id = %allocation.job_id, "allocation event without task states");
                continue;
            };
            for (task_id, raw_state) in task_states {
                if is_connect_proxy(task_id) {
                    continue;
                }
                let Some(state) = TaskState::deserialize_lenient(raw_state) else {
                    tracing::warn!(index, task_id = %task_id, "skipping malformed task state");
                    continue;
                };
                self.process_task(index, &allocation, task_id, &state, &mut notifications);
            }
        }

        Ok(RecordOutcome::Notifications(notifications))
    }

    fn process_task(
        &mut self,
        index: u64,
        allocation: &Allocation,
        task_id: &str,
        state: &TaskState,
        out: &mut Vec<Notification>,
    ) {
        let task = TaskIdentifier::new(allocation.namespace.as_deref(), &allocation.job_id, task_id);
        let cached = self.watermarks.get_or_init(&task);

        let batch = filter_task_events(state.task_events(), cached, &self.config);

        if let Some(batch_max) = batch.batch_max {
            if self.watermarks.advance(&task, batch_max) {
                tracing::debug!(task = %task, from = %cached, to = %batch_max, "advanced watermark");
            }
        }

        out.extend(batch.emitted.into_iter().map(|event| Notification {
            criticality: classify(&event.event_type, &event.details),
            task: task.clone(),
            namespace: allocation.namespace.clone(),
            job_id: allocation.job_id.clone(),
            task_id: task_id.to_string(),
            node_name: allocation.node_name.clone(),
            event_type: event.event_type,
            display_message: event.display_message,
            details: event.details,
            time: event.time,
            index,
        }));
    }
}
