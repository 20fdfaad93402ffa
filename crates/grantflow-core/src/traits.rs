//! Trait definitions for the seams around the coordinator.
//!
//! - `PlatformGateway`: the platform that actually shows grant prompts
//! - `GrantVerifier`: host policy that may veto a platform grant
//! - `TraceSink`: receiver of the diagnostic lifecycle trace
//!
//! The coordinator owns none of these behaviors. It only decides when to
//! call them and what to do with their answers.

use grantflow_contracts::{
    batch::BatchId,
    capability::CapabilityKey,
    error::GrantResult,
    host::HostContext,
    lifecycle::LifecycleRecord,
};

/// The platform that holds the source of truth for grants.
///
/// Query methods are called while the registry lock is held and must not
/// call back into the coordinator. `request_batch` is called after the lock
/// is released and may deliver its result synchronously.
pub trait PlatformGateway: Send + Sync {
    /// Whether capabilities are granted at runtime at all.
    ///
    /// Platforms that grant everything at install time return false; the
    /// coordinator then treats every key as granted and never prompts.
    fn supports_runtime_grants(&self) -> bool {
        true
    }

    /// Return true if the platform currently grants `key`.
    ///
    /// Returns `GrantError::HostDetached` when no host is available to ask.
    fn is_granted(&self, key: &CapabilityKey) -> GrantResult<bool>;

    /// Return true if `key` is denied by policy and no prompt can change it.
    fn is_permanently_denied(&self, key: &CapabilityKey) -> GrantResult<bool>;

    /// Return true if the platform recommends explaining why `key` is needed.
    fn should_show_rationale(&self, key: &CapabilityKey) -> GrantResult<bool>;

    /// Ask the user for every key in `keys` in one prompt.
    ///
    /// Fire-and-forget: the platform later hands exactly one `BatchResult`
    /// tagged with `batch` to `RequestCoordinator::on_batch_result`.
    fn request_batch(&self, keys: &[CapabilityKey], batch: BatchId) -> GrantResult<()>;

    /// Describe the device for post-grant verification.
    fn host_context(&self) -> HostContext {
        HostContext::default()
    }
}

/// Host policy consulted whenever the platform reports a grant.
///
/// Returning `Ok(false)` flips the delivered outcome to denied. Errors and
/// panics are treated the same way: a verifier that cannot decide never
/// lets a grant through.
pub trait GrantVerifier: Send + Sync {
    fn verify(&self, key: &CapabilityKey, context: &HostContext) -> GrantResult<bool>;
}

impl<F> GrantVerifier for F
where
    F: Fn(&CapabilityKey, &HostContext) -> GrantResult<bool> + Send + Sync,
{
    fn verify(&self, key: &CapabilityKey, context: &HostContext) -> GrantResult<bool> {
        self(key, context)
    }
}

/// The default verifier: the platform's word is final.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustPlatform;

impl GrantVerifier for TrustPlatform {
    fn verify(&self, _key: &CapabilityKey, _context: &HostContext) -> GrantResult<bool> {
        Ok(true)
    }
}

/// Receiver of lifecycle records while logging is switched on.
pub trait TraceSink: Send + Sync {
    fn record(&self, record: LifecycleRecord);
}
