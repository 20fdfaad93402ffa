//! Host description handed to post-grant verification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What the embedding host knows about the device it runs on.
///
/// The core never reads these fields; they exist for verification hooks
/// that second-guess a platform grant on particular devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostContext {
    /// Device brand as reported by the platform (e.g. "xiaomi").
    pub device_brand: Option<String>,
    /// Free-form host attributes a verification check may consult.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl HostContext {
    /// Context for a device of the given brand.
    pub fn for_brand(brand: impl Into<String>) -> Self {
        Self {
            device_brand: Some(brand.into()),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute, builder style.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}
