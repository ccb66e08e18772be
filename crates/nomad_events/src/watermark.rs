use std::collections::HashMap;

use crate::model::{TaskIdentifier, UnixNanos};

/// Per-task timestamp of the newest event already handled.
///
/// Entries are seeded with the process-start time on first reference and only ever move forward.
#[derive(Debug, Clone)]
pub struct WatermarkTable {
    seed: UnixNanos,
    entries: HashMap<TaskIdentifier, UnixNanos>,
}

impl WatermarkTable {
    pub fn new(seed: UnixNanos) -> Self {
        Self {
            seed,
            entries: HashMap::new(),
        }
    }

    pub fn seed(&self) -> UnixNanos {
        self.seed
    }

    pub fn get_or_init(&mut self, task: &TaskIdentifier) -> UnixNanos {
        if let Some(existing) = self.entries.get(task) {
            return *existing;
        }
        self.entries.insert(task.clone(), self.seed);
        self.seed
    }

    pub fn get(&self, task: &TaskIdentifier) -> Option<UnixNanos> {
        self.entries.get(task).copied()
    }

    /// Returns `true` if the watermark moved.
    pub fn advance(&mut self, task: &TaskIdentifier, candidate: UnixNanos) -> bool {
        let seed = self.seed;
        let current = self.entries.entry(task.clone()).or_insert(seed);
        if candidate > *current {
            *current = candidate;
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskIdentifier, UnixNanos)> {
        self.entries.iter().map(|(task, at)| (task, *at))
    }
}
