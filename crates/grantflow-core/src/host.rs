//! Host-scoped retention of the pending request registry.
//!
//! A host UI may be torn down and rebuilt (an orientation change, say)
//! while a platform prompt is still open. The platform delivers its answer
//! to whichever host exists afterwards, so the registry must belong to
//! something that outlives any single host instance.
//!
//! `RetainedRegistry` is that something. The host integration layer keeps
//! one per logical host, hands `get()` to every coordinator it builds, and
//! calls `release()` only when the host goes away for good.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::registry::PendingRequestRegistry;

/// Lazily created, recreation-proof holder of one `PendingRequestRegistry`.
#[derive(Default)]
pub struct RetainedRegistry {
    slot: Mutex<Option<Arc<PendingRequestRegistry>>>,
}

impl RetainedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The retained registry, created on first access.
    ///
    /// Concurrent first calls construct exactly one registry.
    pub fn get(&self) -> Arc<PendingRequestRegistry> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let registry = slot.get_or_insert_with(|| {
            debug!("creating retained pending request registry");
            Arc::new(PendingRequestRegistry::new())
        });
        Arc::clone(registry)
    }

    /// Return true once `get()` has created the registry.
    pub fn is_created(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Final teardown: drop the registry and close every pending entry.
    ///
    /// Callers still waiting complete without a value. Returns how many
    /// entries were closed. A later `get()` starts a fresh registry.
    pub fn release(&self) -> usize {
        let taken = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match taken {
            Some(registry) => {
                let closed = registry.abandon_all();
                debug!(closed, "released retained pending request registry");
                closed
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use futures::FutureExt;

    use grantflow_contracts::capability::CapabilityKey;

    use crate::registry::Broadcaster;

    use super::RetainedRegistry;

    #[test]
    fn registry_is_created_lazily_and_reused() {
        let retained = RetainedRegistry::new();
        assert!(!retained.is_created());

        let first = retained.get();
        let second = retained.get();

        assert!(retained.is_created());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn concurrent_first_access_builds_one_registry() {
        let retained = Arc::new(RetainedRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let retained = Arc::clone(&retained);
                thread::spawn(move || retained.get())
            })
            .collect();

        let registries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for registry in &registries[1..] {
            assert!(Arc::ptr_eq(&registries[0], registry));
        }
    }

    #[test]
    fn entries_survive_while_the_holder_lives() {
        let retained = RetainedRegistry::new();
        let camera = CapabilityKey::new("camera");

        // First host instance registers a pending request, then goes away.
        {
            let registry = retained.get();
            registry.put(camera.clone(), Broadcaster::new()).unwrap();
        }

        // The recreated host sees the same entry.
        assert!(retained.get().has(&camera));
    }

    #[test]
    fn release_closes_pending_entries() {
        let retained = RetainedRegistry::new();
        let broadcaster = Broadcaster::new();
        let sub = broadcaster.subscribe();
        retained.get().put(CapabilityKey::new("camera"), broadcaster).unwrap();

        assert_eq!(retained.release(), 1);
        assert!(!retained.is_created());
        assert_eq!(sub.now_or_never(), Some(None));

        // Nothing left to release.
        assert_eq!(retained.release(), 0);
    }
}
