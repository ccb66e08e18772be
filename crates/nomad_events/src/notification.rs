use std::collections::BTreeMap;

use crate::classify::Criticality;
use crate::model::{TaskIdentifier, UnixNanos};

/// A task event that passed filtering, with enough context for a notifier to format it.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub task: TaskIdentifier,
    pub namespace: Option<String>,
    pub job_id: String,
    pub task_id: String,
    pub node_name: String,
    pub event_type: String,
    pub display_message: String,
    pub details: BTreeMap<String, String>,
    pub criticality: Criticality,
    pub time: UnixNanos,
    /// Stream index of the record that carried the event.
    pub index: u64,
}
