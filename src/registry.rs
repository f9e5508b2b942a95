//! ToolRegistry: tracks the workers that are live for an in-flight request.
//!
//! Entries exist only for the duration of a single gateway call: a worker is
//! tracked once its tool count is known and forgotten when the call returns.
//! The summed tool counts are what the capacity ceiling is checked against.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::error::CascadeError;

/// Where a worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    /// Built in-process for the duration of one call
    Internal,
    /// A spawned subprocess reached over HTTP
    External,
}

/// A tracked worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerEntry {
    pub kind: WorkerKind,
    pub tool_count: usize,
}

/// Process-wide map from worker name to its tracked entry.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: Mutex<HashMap<String, WorkerEntry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, WorkerEntry>> {
        // The map holds plain data; a panic mid-update cannot leave it torn.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sum of tool counts across all tracked workers.
    pub fn total_tools(&self) -> usize {
        self.lock().values().map(|e| e.tool_count).sum()
    }

    /// Reject with `CapacityExceeded` when the tracked total is at or above `max`.
    pub fn check_capacity(&self, max: usize) -> crate::Result<()> {
        let total = self.total_tools();
        if total >= max {
            tracing::warn!(total_tools = total, max_tools = max, "tool capacity reached");
            return Err(CascadeError::CapacityExceeded { max });
        }
        Ok(())
    }

    /// Start tracking `name`, replacing any previous entry of the same name.
    pub fn track(&self, name: &str, kind: WorkerKind, tool_count: usize) {
        tracing::debug!(worker = %name, ?kind, tool_count, "tracking worker");
        self.lock()
            .insert(name.to_string(), WorkerEntry { kind, tool_count });
    }

    /// Stop tracking `name`. Returns the removed entry, if any.
    pub fn forget(&self, name: &str) -> Option<WorkerEntry> {
        let removed = self.lock().remove(name);
        if removed.is_some() {
            tracing::debug!(worker = %name, "forgot worker");
        }
        removed
    }

    /// Track `name` until the returned guard is dropped.
    pub fn track_scoped<'a>(
        &'a self,
        name: &str,
        kind: WorkerKind,
        tool_count: usize,
    ) -> TrackedWorker<'a> {
        self.track(name, kind, tool_count);
        TrackedWorker {
            registry: self,
            name: name.to_string(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current entries, for diagnostics.
    pub fn snapshot(&self) -> HashMap<String, WorkerEntry> {
        self.lock().clone()
    }
}

/// Registry entry that is removed when this guard goes out of scope,
/// including when the owning request future is dropped mid-call.
pub struct TrackedWorker<'a> {
    registry: &'a ToolRegistry,
    name: String,
}

impl Drop for TrackedWorker<'_> {
    fn drop(&mut self) {
        self.registry.forget(&self.name);
    }
}
