//! Grant decisions delivered to callers.
//!
//! `Outcome` is the decision for a single key. `CombinedOutcome` folds the
//! outcomes of a multi-key request into one record: granted only if every
//! key was granted, rationale recommended if any key recommends it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityKey;

/// The grant decision for one capability key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    /// The key this decision belongs to.
    pub key: CapabilityKey,
    /// Whether the capability ended up granted.
    pub granted: bool,
    /// The host should explain why the capability is needed before asking
    /// again. Only meaningful on a denial the user can still revisit.
    pub rationale_recommended: bool,
}

impl Outcome {
    pub fn new(key: CapabilityKey, granted: bool, rationale_recommended: bool) -> Self {
        Self { key, granted, rationale_recommended }
    }

    /// A grant the platform already holds; never carries a rationale.
    pub fn granted(key: CapabilityKey) -> Self {
        Self::new(key, true, false)
    }

    /// A denial that no prompt can change (e.g. revoked by policy).
    pub fn denied(key: CapabilityKey) -> Self {
        Self::new(key, false, false)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Outcome{{key='{}', granted={}, rationale_recommended={}}}",
            self.key, self.granted, self.rationale_recommended
        )
    }
}

/// Several outcomes folded into one record.
///
/// `key` is synthetic: the constituent keys joined with ", " in the order
/// the outcomes are given. It never names a real capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedOutcome {
    pub key: CapabilityKey,
    /// AND over every constituent `granted`.
    pub granted: bool,
    /// OR over every constituent `rationale_recommended`.
    pub rationale_recommended: bool,
}

impl CombinedOutcome {
    /// Fold `outcomes` into one record.
    ///
    /// An empty slice folds to a vacuous grant; the coordinator never calls
    /// this with zero outcomes because it rejects empty key sets up front.
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let key = outcomes
            .iter()
            .map(|o| o.key.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            key: CapabilityKey(key),
            granted: outcomes.iter().all(|o| o.granted),
            rationale_recommended: outcomes.iter().any(|o| o.rationale_recommended),
        }
    }
}

impl fmt::Display for CombinedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Outcome{{key='{}', granted={}, rationale_recommended={}}}",
            self.key, self.granted, self.rationale_recommended
        )
    }
}
