//! Configuration schema for grantflow hosts.
//!
//! A `GrantConfig` is deserialized from TOML. It carries the lifecycle
//! logging toggle and the `[verification]` section that drives
//! [`TomlGrantVerifier`](crate::verifier::TomlGrantVerifier).
//!
//! ```toml
//! logging = true
//!
//! [verification]
//! special_devices = ["xiaomi", "oppo"]
//!
//! [[verification.rules]]
//! id = "storage-write-check"
//! description = "Confirm storage is writable"
//! capabilities = ["storage.write", "storage.read"]
//! check = "storage"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use grantflow_contracts::error::{GrantError, GrantResult};

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantConfig {
    /// Initial state of the coordinator's lifecycle trace.
    #[serde(default)]
    pub logging: bool,

    #[serde(default)]
    pub verification: VerificationConfig,
}

impl GrantConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `GrantError::ConfigError` if the TOML is malformed or does not
    /// match the `GrantConfig` schema.
    pub fn from_toml_str(s: &str) -> GrantResult<Self> {
        toml::from_str(s).map_err(|e| GrantError::ConfigError {
            reason: format!("failed to parse grant config TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> GrantResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| GrantError::ConfigError {
            reason: format!("failed to read grant config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Devices whose platform grants are second-guessed, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Device brands (case-insensitive) on which grants are verified.
    /// Grants on any other device are trusted as reported.
    #[serde(default)]
    pub special_devices: Vec<String>,

    /// Checked in declaration order; the first rule naming a key wins.
    #[serde(default)]
    pub rules: Vec<VerificationRule>,
}

impl VerificationConfig {
    /// Return true if grants on a device of `brand` must be verified.
    pub fn is_special_device(&self, brand: &str) -> bool {
        self.special_devices
            .iter()
            .any(|device| device.eq_ignore_ascii_case(brand))
    }

    /// The first rule that covers `capability`, if any.
    pub fn rule_for(&self, capability: &str) -> Option<&VerificationRule> {
        self.rules.iter().find(|rule| rule.covers(capability))
    }
}

/// One verification rule loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRule {
    /// Stable identifier used in log messages.
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Capability keys this rule covers. `"*"` covers every key.
    pub capabilities: Vec<String>,

    /// Name of the host-registered check that decides.
    pub check: String,
}

impl VerificationRule {
    pub fn covers(&self, capability: &str) -> bool {
        self.capabilities
            .iter()
            .any(|pattern| pattern == "*" || pattern == capability)
    }
}
