//! Config-driven post-grant verification.
//!
//! `TomlGrantVerifier` implements the `GrantVerifier` trait from
//! grantflow-core. Evaluation:
//!
//! 1. If the device brand is not a listed special device → trust the grant.
//! 2. Find the first rule whose `capabilities` cover the key.
//!    No rule → trust the grant.
//! 3. Run the check the rule names. A check that was never registered is an
//!    error, which the coordinator turns into a denial.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use grantflow_contracts::{
    capability::CapabilityKey,
    error::{GrantError, GrantResult},
    host::HostContext,
};
use grantflow_core::traits::GrantVerifier;

use crate::config::{GrantConfig, VerificationConfig};

/// A named check: `Ok(true)` confirms the grant, `Ok(false)` vetoes it.
pub type CheckFn = Box<dyn Fn(&CapabilityKey, &HostContext) -> GrantResult<bool> + Send + Sync>;

/// A `GrantVerifier` whose device list and rules come from TOML.
///
/// ```rust,ignore
/// let mut verifier = TomlGrantVerifier::from_file(Path::new("config/devices.toml"))?;
/// verifier.register_check("storage", Box::new(|_, ctx| Ok(try_storage_write(ctx))));
/// ```
pub struct TomlGrantVerifier {
    config: VerificationConfig,
    checks: HashMap<String, CheckFn>,
}

impl TomlGrantVerifier {
    pub fn new(config: VerificationConfig) -> Self {
        Self {
            config,
            checks: HashMap::new(),
        }
    }

    /// Parse `s` as a full `GrantConfig` and keep its verification section.
    pub fn from_toml_str(s: &str) -> GrantResult<Self> {
        Ok(Self::new(GrantConfig::from_toml_str(s)?.verification))
    }

    pub fn from_file(path: &Path) -> GrantResult<Self> {
        Ok(Self::new(GrantConfig::from_file(path)?.verification))
    }

    /// Register the check a rule refers to by `name`. Replaces any check
    /// previously registered under the same name.
    pub fn register_check(&mut self, name: impl Into<String>, check: CheckFn) {
        self.checks.insert(name.into(), check);
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }
}

impl GrantVerifier for TomlGrantVerifier {
    fn verify(&self, key: &CapabilityKey, context: &HostContext) -> GrantResult<bool> {
        let special = context
            .device_brand
            .as_deref()
            .is_some_and(|brand| self.config.is_special_device(brand));
        if !special {
            return Ok(true);
        }

        let Some(rule) = self.config.rule_for(key.as_str()) else {
            debug!(key = %key, "no verification rule covers capability; trusting platform");
            return Ok(true);
        };

        let Some(check) = self.checks.get(rule.check.as_str()) else {
            warn!(rule_id = %rule.id, check = %rule.check, "verification rule names an unregistered check");
            return Err(GrantError::Verification {
                key: key.to_string(),
                reason: format!("rule '{}' names unregistered check '{}'", rule.id, rule.check),
            });
        };

        let confirmed = check(key, context)?;
        debug!(key = %key, rule_id = %rule.id, confirmed, "post-grant check evaluated");
        Ok(confirmed)
    }
}

impl std::fmt::Debug for TomlGrantVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut checks: Vec<_> = self.checks.keys().collect();
        checks.sort();
        f.debug_struct("TomlGrantVerifier")
            .field("config", &self.config)
            .field("checks", &checks)
            .finish()
    }
}
