use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const ALLOCATION_TOPIC: &str = "Allocation";
pub const DEFAULT_NAMESPACE: &str = "default";
const CONNECT_PROXY_MARKER: &str = "connect-proxy";

/// Nanosecond-resolution Unix timestamp, the unit Nomad reports task event times in.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize)]
#[serde(transparent)]
pub struct UnixNanos(pub i64);

impl UnixNanos {
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(nanos)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }

    pub fn saturating_sub(self, other: Self) -> i64 {
        self.0.saturating_sub(other.0)
    }
}

impl fmt::Display for UnixNanos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable key for one task of one job, used for watermark bookkeeping and display.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TaskIdentifier(String);

impl TaskIdentifier {
    /// The namespace prefix is omitted for the `default` namespace.
    pub fn new(namespace: Option<&str>, job_id: &str, task_id: &str) -> Self {
        match namespace {
            Some(ns) if !ns.is_empty() && ns != DEFAULT_NAMESPACE => {
                Self(format!("{ns}/{job_id}.{task_id}"))
            }
            _ => Self(format!("{job_id}.{task_id}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Consul Connect sidecars are never tracked or surfaced.
pub fn is_connect_proxy(task_id: &str) -> bool {
    task_id.contains(CONNECT_PROXY_MARKER)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventEnvelope {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
}

impl EventEnvelope {
    /// Returns `None` for envelopes that are not objects of the expected shape.
    pub fn deserialize_lenient(raw: &Value) -> Option<Self> {
        Self::deserialize(raw).ok()
    }

    pub fn is_allocation(&self) -> bool {
        self.topic == ALLOCATION_TOPIC
    }

    /// Returns `None` when the payload carries no usable allocation.
    pub fn allocation(&self) -> Option<Allocation> {
        let raw = self.payload.get("Allocation")?;
        serde_json::from_value(raw.clone()).ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Allocation {
    #[serde(rename = "Namespace", default, deserialize_with = "lenient")]
    pub namespace: Option<String>,
    #[serde(rename = "JobID", default, deserialize_with = "lenient")]
    pub job_id: String,
    #[serde(rename = "NodeName", default, deserialize_with = "lenient")]
    pub node_name: String,
    /// Task states stay untyped so one malformed task cannot poison its siblings.
    #[serde(rename = "TaskStates", default, deserialize_with = "lenient")]
    pub task_states: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    /// Kept untyped so one malformed event cannot poison its siblings.
    #[serde(default, deserialize_with = "lenient")]
    pub events: Vec<Value>,
}

impl TaskState {
    /// Returns `None` when the task state is not an object.
    pub fn deserialize_lenient(raw: &Value) -> Option<Self> {
        Self::deserialize(raw).ok()
    }

    /// Typed events in arrival order; events without an integer `Time` are skipped.
    pub fn task_events(&self) -> impl Iterator<Item = TaskEvent> + '_ {
        self.events
            .iter()
            .filter_map(|raw| match TaskEvent::deserialize(raw) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed task event");
                    None
                }
            })
    }
}

/// Only `Time` is required; every other field falls back to empty on a type mismatch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskEvent {
    #[serde(rename = "Type", default, deserialize_with = "lenient")]
    pub event_type: String,
    #[serde(rename = "Time")]
    pub time: UnixNanos,
    #[serde(rename = "DisplayMessage", default, deserialize_with = "lenient")]
    pub display_message: String,
    #[serde(rename = "Details", default, deserialize_with = "lenient_details")]
    pub details: BTreeMap<String, String>,
}

/// Null or mistyped values become `T::default()` instead of failing the enclosing struct.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

fn lenient_details<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(raw) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}
