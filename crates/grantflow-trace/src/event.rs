//! Trace event and log types.
//!
//! `TraceEvent` wraps one `LifecycleRecord` with its position in the trace.
//! `TraceLog` is the snapshot produced by `InMemoryTrace::export_log()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use grantflow_contracts::{
    capability::CapabilityKey,
    error::{GrantError, GrantResult},
    lifecycle::LifecycleRecord,
};

/// One lifecycle record in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Position in the trace, starting at 0.
    pub sequence: u64,

    pub record: LifecycleRecord,
}

/// A snapshot of everything a trace has recorded for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLog {
    /// Label of the traced session (a scenario name, a host id).
    pub session: String,

    /// All events in sequence order.
    pub events: Vec<TraceEvent>,

    /// Wall-clock time (UTC) the snapshot was taken.
    pub exported_at: DateTime<Utc>,
}

impl TraceLog {
    /// Events that concern `key`, in sequence order.
    pub fn events_for<'a>(&'a self, key: &'a CapabilityKey) -> impl Iterator<Item = &'a TraceEvent> + 'a {
        self.events.iter().filter(move |event| &event.record.key == key)
    }

    /// Render the log as pretty-printed JSON.
    pub fn to_json(&self) -> GrantResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| GrantError::Serialization {
            reason: format!("failed to serialize trace log: {}", e),
        })
    }
}
