//! A scripted stand-in for a mobile platform's grant service.
//!
//! `SimulatedPlatform` keeps a grant state per capability, records every
//! prompt the coordinator asks it to show, and turns scripted user answers
//! into the `BatchResult` a real platform would deliver. It never calls
//! the coordinator itself; the scenario that plays the user hands results
//! back through `RequestCoordinator::on_batch_result`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use grantflow_contracts::{
    batch::{BatchId, BatchResult},
    capability::CapabilityKey,
    error::{GrantError, GrantResult},
    host::HostContext,
};
use grantflow_core::traits::PlatformGateway;

/// What the platform currently knows about one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrantState {
    /// Never asked.
    #[default]
    Undecided,
    Granted,
    /// Denied once; the platform recommends a rationale before asking again.
    Denied,
    /// Denied with "don't ask again"; no rationale is recommended.
    DeniedDontAsk,
    /// Revoked by device policy. No prompt can change it.
    Revoked,
}

/// How the simulated user answers one capability in a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAnswer {
    Allow,
    Deny,
    DenyDontAskAgain,
}

/// A prompt the coordinator asked the platform to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub batch: BatchId,
    pub keys: Vec<CapabilityKey>,
}

#[derive(Default)]
struct SimState {
    grants: HashMap<CapabilityKey, GrantState>,
    prompts: Vec<Prompt>,
    attached: bool,
}

pub struct SimulatedPlatform {
    runtime_grants: bool,
    brand: Option<String>,
    attributes: BTreeMap<String, String>,
    state: Mutex<SimState>,
}

impl SimulatedPlatform {
    /// A platform that grants at runtime, with an attached host.
    pub fn new() -> Self {
        Self {
            runtime_grants: true,
            brand: None,
            attributes: BTreeMap::new(),
            state: Mutex::new(SimState {
                attached: true,
                ..SimState::default()
            }),
        }
    }

    /// A platform that grants everything at install time.
    pub fn install_time() -> Self {
        Self {
            runtime_grants: false,
            ..Self::new()
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Preset the state of `key`, builder style.
    pub fn with_state(self, key: impl Into<CapabilityKey>, state: GrantState) -> Self {
        self.set_state(key.into(), state);
        self
    }

    pub fn set_state(&self, key: CapabilityKey, state: GrantState) {
        self.state().grants.insert(key, state);
    }

    pub fn state_of(&self, key: &CapabilityKey) -> GrantState {
        self.state().grants.get(key).copied().unwrap_or_default()
    }

    /// Simulate the host going away, e.g. during recreation.
    pub fn detach_host(&self) {
        self.state().attached = false;
        info!("simulated host detached");
    }

    pub fn attach_host(&self) {
        self.state().attached = true;
        info!("simulated host attached");
    }

    /// Every prompt shown so far, oldest first.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.state().prompts.clone()
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.state().prompts.last().cloned()
    }

    /// Apply the user's answers to the prompt shown for `batch` and build
    /// the result the platform would deliver.
    ///
    /// Keys of the prompt missing from `answers` are left out of the result,
    /// as when the user dismisses the dialog half way.
    pub fn answer(&self, batch: BatchId, answers: &[(CapabilityKey, UserAnswer)]) -> GrantResult<BatchResult> {
        let mut state = self.state();
        let Some(prompt) = state.prompts.iter().find(|p| p.batch == batch).cloned() else {
            return Err(GrantError::Platform {
                reason: format!("no prompt was shown for batch {}", batch),
            });
        };

        let mut result = BatchResult {
            batch,
            keys: Vec::new(),
            granted: Vec::new(),
            rationale: Vec::new(),
        };
        for (key, answer) in answers.iter().filter(|(key, _)| prompt.keys.contains(key)) {
            let next = match answer {
                UserAnswer::Allow => GrantState::Granted,
                UserAnswer::Deny => GrantState::Denied,
                UserAnswer::DenyDontAskAgain => GrantState::DeniedDontAsk,
            };
            state.grants.insert(key.clone(), next);
            result.keys.push(key.clone());
            result.granted.push(next == GrantState::Granted);
            result.rationale.push(next == GrantState::Denied);
        }

        debug!(batch = %batch, answered = result.keys.len(), asked = prompt.keys.len(), "user answered prompt");
        Ok(result)
    }

    /// Answer every key of the prompt for `batch` the same way.
    pub fn answer_all(&self, batch: BatchId, answer: UserAnswer) -> GrantResult<BatchResult> {
        let keys = self
            .prompts()
            .into_iter()
            .find(|p| p.batch == batch)
            .map(|p| p.keys)
            .unwrap_or_default();
        let answers: Vec<_> = keys.into_iter().map(|key| (key, answer)).collect();
        self.answer(batch, &answers)
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attached_state(&self) -> GrantResult<MutexGuard<'_, SimState>> {
        let state = self.state();
        if state.attached {
            Ok(state)
        } else {
            Err(GrantError::HostDetached)
        }
    }

    fn lookup(&self, key: &CapabilityKey) -> GrantResult<GrantState> {
        Ok(self.attached_state()?.grants.get(key).copied().unwrap_or_default())
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformGateway for SimulatedPlatform {
    fn supports_runtime_grants(&self) -> bool {
        self.runtime_grants
    }

    fn is_granted(&self, key: &CapabilityKey) -> GrantResult<bool> {
        Ok(self.lookup(key)? == GrantState::Granted)
    }

    fn is_permanently_denied(&self, key: &CapabilityKey) -> GrantResult<bool> {
        Ok(self.lookup(key)? == GrantState::Revoked)
    }

    fn should_show_rationale(&self, key: &CapabilityKey) -> GrantResult<bool> {
        Ok(self.lookup(key)? == GrantState::Denied)
    }

    fn request_batch(&self, keys: &[CapabilityKey], batch: BatchId) -> GrantResult<()> {
        let mut state = self.attached_state()?;
        state.prompts.push(Prompt {
            batch,
            keys: keys.to_vec(),
        });
        info!(batch = %batch, keys = keys.len(), "platform prompt shown");
        Ok(())
    }

    fn host_context(&self) -> HostContext {
        HostContext {
            device_brand: self.brand.clone(),
            attributes: self.attributes.clone(),
        }
    }
}
