//! Lifecycle records for the diagnostic trace.
//!
//! The coordinator emits one `LifecycleRecord` per key lifecycle event when
//! logging is switched on. Records are informational; nothing reads them
//! back to make decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{batch::BatchId, capability::CapabilityKey};

/// The lifecycle events a key goes through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleStage {
    /// A caller asked for the key.
    Requested,
    /// The key was already pending; the caller joined the in-flight request.
    Coalesced,
    /// The key was sent to the platform as part of a batch.
    BatchSent { batch: BatchId },
    /// The platform decided the key and the decision was fanned out.
    Resolved { granted: bool },
    /// The pending entry was dropped without a decision.
    Abandoned,
}

/// One lifecycle event for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub key: CapabilityKey,
    pub stage: LifecycleStage,
    /// Wall-clock time the event happened (UTC).
    pub occurred_at: DateTime<Utc>,
}

impl LifecycleRecord {
    pub fn now(key: CapabilityKey, stage: LifecycleStage) -> Self {
        Self { key, stage, occurred_at: Utc::now() }
    }
}
