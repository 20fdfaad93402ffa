//! In-memory implementation of `TraceSink`.
//!
//! `InMemoryTrace` keeps every lifecycle record in a `Vec` behind a `Mutex`,
//! numbered in arrival order. Clones share the same buffer, so one handle
//! can be given to the coordinator while another exports the log.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::info;

use grantflow_contracts::lifecycle::LifecycleRecord;
use grantflow_core::traits::TraceSink;

use crate::event::{TraceEvent, TraceLog};

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct TraceState {
    /// All events recorded so far, in arrival order.
    pub(crate) events: Vec<TraceEvent>,

    /// The next sequence number to assign.
    pub(crate) sequence: u64,
}

// ── Public sink ───────────────────────────────────────────────────────────────

/// An append-only, in-memory lifecycle trace.
#[derive(Clone)]
pub struct InMemoryTrace {
    session: String,
    state: Arc<Mutex<TraceState>>,
}

impl InMemoryTrace {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            state: Arc::new(Mutex::new(TraceState::default())),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Snapshot every event recorded so far.
    pub fn export_log(&self) -> TraceLog {
        let state = self.state();
        info!(session = %self.session, event_count = state.events.len(), "trace log exported");
        TraceLog {
            session: self.session.clone(),
            events: state.events.clone(),
            exported_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all recorded events. Sequence numbers keep counting.
    pub fn clear(&self) {
        self.state().events.clear();
    }

    fn state(&self) -> MutexGuard<'_, TraceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── TraceSink impl ────────────────────────────────────────────────────────────

impl TraceSink for InMemoryTrace {
    fn record(&self, record: LifecycleRecord) {
        let mut state = self.state();
        let sequence = state.sequence;
        state.events.push(TraceEvent { sequence, record });
        state.sequence += 1;
    }
}
