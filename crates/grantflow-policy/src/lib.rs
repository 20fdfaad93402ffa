//! # grantflow-policy
//!
//! TOML configuration for grantflow hosts.
//!
//! ## Overview
//!
//! [`GrantConfig`] holds the lifecycle logging toggle and a verification
//! section. [`TomlGrantVerifier`] turns that section into a
//! [`GrantVerifier`](grantflow_core::traits::GrantVerifier): grants on the
//! listed devices are confirmed by host-registered checks before callers
//! see them.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use grantflow_policy::{GrantConfig, TomlGrantVerifier};
//!
//! let config = GrantConfig::from_file(Path::new("config/devices.toml"))?;
//! let mut verifier = TomlGrantVerifier::new(config.verification.clone());
//! verifier.register_check("storage", Box::new(|_, _| Ok(true)));
//! // Pass `Arc::new(verifier)` to `RequestCoordinator::with_verifier`.
//! ```

pub mod config;
pub mod verifier;

pub use config::{GrantConfig, VerificationConfig, VerificationRule};
pub use verifier::{CheckFn, TomlGrantVerifier};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use grantflow_contracts::{capability::CapabilityKey, error::GrantError, host::HostContext};
    use grantflow_core::traits::GrantVerifier;

    use crate::{GrantConfig, TomlGrantVerifier};

    // ── Helpers ───────────────────────────────────────────────────────────────

    const DEVICES: &str = r#"
        logging = true

        [verification]
        special_devices = ["Xiaomi", "oppo"]

        [[verification.rules]]
        id = "storage-write-check"
        description = "Confirm storage is writable"
        capabilities = ["storage.write", "storage.read"]
        check = "storage"

        [[verification.rules]]
        id = "catch-all"
        capabilities = ["*"]
        check = "generic"
    "#;

    fn key(name: &str) -> CapabilityKey {
        CapabilityKey::new(name)
    }

    fn verifier_with(storage_ok: bool, generic_ok: bool) -> TomlGrantVerifier {
        let mut verifier = TomlGrantVerifier::from_toml_str(DEVICES).unwrap();
        verifier.register_check("storage", Box::new(move |_, _| Ok(storage_ok)));
        verifier.register_check("generic", Box::new(move |_, _| Ok(generic_ok)));
        verifier
    }

    // ── Config loading ────────────────────────────────────────────────────────

    #[test]
    fn parses_full_config() {
        let config = GrantConfig::from_toml_str(DEVICES).unwrap();

        assert!(config.logging);
        assert_eq!(config.verification.special_devices, vec!["Xiaomi", "oppo"]);
        assert_eq!(config.verification.rules.len(), 2);
        assert_eq!(config.verification.rules[0].id, "storage-write-check");
        assert_eq!(config.verification.rules[1].description, "");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = GrantConfig::from_toml_str("").unwrap();

        assert!(!config.logging);
        assert!(config.verification.special_devices.is_empty());
        assert!(config.verification.rules.is_empty());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = GrantConfig::from_toml_str("logging = [").unwrap_err();
        assert!(matches!(err, GrantError::ConfigError { .. }), "got {err:?}");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = GrantConfig::from_file(std::path::Path::new("/nonexistent/grantflow.toml")).unwrap_err();
        match err {
            GrantError::ConfigError { reason } => assert!(reason.contains("failed to read")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn rule_lookup_honors_declaration_order_and_wildcard() {
        let config = GrantConfig::from_toml_str(DEVICES).unwrap().verification;

        assert_eq!(config.rule_for("storage.read").unwrap().id, "storage-write-check");
        assert_eq!(config.rule_for("camera").unwrap().id, "catch-all");
        assert!(config.is_special_device("xiaomi"));
        assert!(config.is_special_device("OPPO"));
        assert!(!config.is_special_device("pixel"));
    }

    // ── Verification ──────────────────────────────────────────────────────────

    #[test]
    fn ordinary_device_is_trusted_without_running_checks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut verifier = TomlGrantVerifier::from_toml_str(DEVICES).unwrap();
        let counter = Arc::clone(&calls);
        verifier.register_check(
            "storage",
            Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }),
        );

        let pixel = HostContext::for_brand("pixel");
        assert_eq!(verifier.verify(&key("storage.write"), &pixel), Ok(true));
        assert_eq!(verifier.verify(&key("storage.write"), &HostContext::default()), Ok(true));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn special_device_runs_the_matching_check() {
        let verifier = verifier_with(false, true);
        let xiaomi = HostContext::for_brand("xiaomi");

        assert_eq!(verifier.verify(&key("storage.write"), &xiaomi), Ok(false));
        assert_eq!(verifier.verify(&key("camera"), &xiaomi), Ok(true));
    }

    #[test]
    fn checks_see_host_attributes() {
        let mut verifier = TomlGrantVerifier::from_toml_str(DEVICES).unwrap();
        verifier.register_check(
            "storage",
            Box::new(|_, ctx| Ok(ctx.attributes.get("storage.writable").map(String::as_str) == Some("yes"))),
        );

        let writable = HostContext::for_brand("oppo").with_attribute("storage.writable", "yes");
        let read_only = HostContext::for_brand("oppo").with_attribute("storage.writable", "no");

        assert_eq!(verifier.verify(&key("storage.read"), &writable), Ok(true));
        assert_eq!(verifier.verify(&key("storage.read"), &read_only), Ok(false));
    }

    #[test]
    fn unregistered_check_is_an_error() {
        let verifier = TomlGrantVerifier::from_toml_str(DEVICES).unwrap();

        let err = verifier
            .verify(&key("storage.read"), &HostContext::for_brand("xiaomi"))
            .unwrap_err();
        match err {
            GrantError::Verification { key, reason } => {
                assert_eq!(key, "storage.read");
                assert!(reason.contains("storage"), "reason was: {reason}");
            }
            other => panic!("expected Verification, got {other:?}"),
        }
    }

    #[test]
    fn no_covering_rule_trusts_platform() {
        let toml = r#"
            [verification]
            special_devices = ["xiaomi"]

            [[verification.rules]]
            id = "storage-write-check"
            capabilities = ["storage.write"]
            check = "storage"
        "#;
        let verifier = TomlGrantVerifier::from_toml_str(toml).unwrap();

        assert_eq!(verifier.verify(&key("camera"), &HostContext::for_brand("xiaomi")), Ok(true));
    }
}
