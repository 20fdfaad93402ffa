//! Capability keys.
//!
//! A key names one platform capability (for example a permission name). The
//! coordinator never invents keys; callers supply them and the core only
//! compares them for equality.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one grantable capability.
///
/// Example: `CapabilityKey::new("android.permission.CAMERA")`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapabilityKey(pub String);

impl CapabilityKey {
    /// Construct a key from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CapabilityKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CapabilityKey {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Build a key list from string literals, mostly for tests and demos.
pub fn keys<I, S>(names: I) -> Vec<CapabilityKey>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(CapabilityKey::new).collect()
}
