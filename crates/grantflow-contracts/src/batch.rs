//! Platform round trips.
//!
//! A batch is the set of keys sent together in one platform call. `BatchId`
//! is the correlation token handed to the platform and echoed back with the
//! result, so results can be matched even if batches overlap.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    capability::CapabilityKey,
    error::{GrantError, GrantResult},
};

/// Correlation token for one platform round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub uuid::Uuid);

impl BatchId {
    /// Create a new, unique batch ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the platform reports back for one batch.
///
/// The three vectors are index-aligned: `granted[i]` and `rationale[i]`
/// describe `keys[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// The token the coordinator dispatched the batch with.
    pub batch: BatchId,
    pub keys: Vec<CapabilityKey>,
    pub granted: Vec<bool>,
    pub rationale: Vec<bool>,
}

impl BatchResult {
    /// Check that the three arrays have the same length.
    pub fn validate(&self) -> GrantResult<()> {
        if self.keys.len() != self.granted.len() || self.keys.len() != self.rationale.len() {
            return Err(GrantError::MalformedBatchResult {
                reason: format!(
                    "batch {} reports {} keys, {} grant flags and {} rationale flags",
                    self.batch,
                    self.keys.len(),
                    self.granted.len(),
                    self.rationale.len()
                ),
            });
        }
        Ok(())
    }
}
