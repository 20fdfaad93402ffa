//! The pending request registry and its single-fire broadcaster.
//!
//! The registry holds at most one `Broadcaster` per capability key: the
//! outstanding platform request for that key. Every caller that asks for
//! the key while it is pending subscribes to the same broadcaster, and the
//! platform's decision is delivered to all of them at once.
//!
//! The registry also remembers which keys went out in which batch so a
//! platform result can be matched against its correlation token.
//!
//! # Thread safety
//!
//! All state sits behind one `Mutex`. The coordinator takes the lock once
//! per coalescing event through [`PendingRequestRegistry::lock`], so two
//! threads can never both decide to prompt for the same key.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use futures::channel::oneshot;
use tracing::warn;

use grantflow_contracts::{
    batch::BatchId,
    capability::CapabilityKey,
    error::{GrantError, GrantResult},
    host::HostContext,
    outcome::Outcome,
};

// ── Broadcaster ───────────────────────────────────────────────────────────────

enum Signal {
    /// Not fired yet; one sender per subscriber.
    Waiting(Vec<oneshot::Sender<Outcome>>),
    /// Fired or closed. Late subscribers complete empty.
    Done,
}

/// A single-fire, multi-subscriber result channel.
///
/// Emits at most one `Outcome` to every subscriber, then closes. Cloning
/// yields another handle to the same channel.
#[derive(Clone)]
pub struct Broadcaster {
    signal: Arc<Mutex<Signal>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            signal: Arc::new(Mutex::new(Signal::Waiting(Vec::new()))),
        }
    }

    /// Register a new subscriber.
    ///
    /// A subscription taken after the broadcaster fired or closed completes
    /// immediately with `None`.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = oneshot::channel();
        if let Signal::Waiting(subscribers) = &mut *self.lock() {
            subscribers.push(tx);
        }
        Subscription { rx }
    }

    /// Number of subscribers still listening.
    pub fn subscriber_count(&self) -> usize {
        match &*self.lock() {
            Signal::Waiting(subscribers) => subscribers.iter().filter(|tx| !tx.is_canceled()).count(),
            Signal::Done => 0,
        }
    }

    /// Return true once the broadcaster has fired or closed.
    pub fn is_done(&self) -> bool {
        matches!(&*self.lock(), Signal::Done)
    }

    /// Deliver `outcome` to every subscriber and close.
    ///
    /// Returns how many subscribers received it. Subscribers that went away
    /// are skipped silently. A second call is a no-op returning 0.
    pub(crate) fn fire(&self, outcome: Outcome) -> usize {
        let subscribers = self.take();
        subscribers
            .into_iter()
            .map(|tx| tx.send(outcome.clone()).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }

    /// Close without firing. Every subscriber completes with `None`.
    pub(crate) fn close(&self) {
        drop(self.take());
    }

    fn take(&self) -> Vec<oneshot::Sender<Outcome>> {
        match std::mem::replace(&mut *self.lock(), Signal::Done) {
            Signal::Waiting(subscribers) => subscribers,
            Signal::Done => Vec::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Signal> {
        self.signal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's view of a `Broadcaster`.
///
/// Resolves to `Some(outcome)` when the broadcaster fires, or `None` when it
/// is closed without firing. Dropping a subscription never affects the
/// broadcaster or its other subscribers.
#[must_use = "a subscription does nothing unless awaited"]
pub struct Subscription {
    rx: oneshot::Receiver<Outcome>,
}

impl Future for Subscription {
    type Output = Option<Outcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// One batch handed to the platform and not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBatch {
    pub keys: Vec<CapabilityKey>,
    /// Host context captured when the batch was sent.
    pub context: HostContext,
}

#[derive(Default)]
pub(crate) struct PendingState {
    entries: HashMap<CapabilityKey, Broadcaster>,
    batches: HashMap<BatchId, PendingBatch>,
}

/// Key → broadcaster map of outstanding platform requests.
///
/// Owned by whatever host integration layer embeds the coordinator and
/// shared with it through an `Arc`. It must outlive host recreation so a
/// platform callback delivered to the recreated host can still resolve
/// entries created before it; see [`crate::host::RetainedRegistry`].
#[derive(Default)]
pub struct PendingRequestRegistry {
    state: Mutex<PendingState>,
}

impl PendingRequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the registry for a sequence of reads and mutations that must
    /// not interleave with another caller's.
    pub fn lock(&self) -> PendingGuard<'_> {
        PendingGuard {
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Return true iff a request for `key` is pending.
    pub fn has(&self, key: &CapabilityKey) -> bool {
        self.lock().has(key)
    }

    /// The broadcaster of the pending request for `key`, if any.
    pub fn get(&self, key: &CapabilityKey) -> Option<Broadcaster> {
        self.lock().get(key)
    }

    /// Register `broadcaster` as the pending request for `key`.
    ///
    /// Returns `GrantError::DuplicatePending` and leaves the existing entry
    /// in place if `key` already has one.
    pub fn put(&self, key: CapabilityKey, broadcaster: Broadcaster) -> GrantResult<()> {
        self.lock().put(key, broadcaster)
    }

    /// Remove the entry for `key` and deliver `outcome` to its subscribers.
    ///
    /// Returns false, and logs, if no request for `key` was pending: the
    /// platform answered something that was never asked or answered it twice.
    pub fn resolve(&self, key: &CapabilityKey, outcome: Outcome) -> bool {
        let removed = self.lock().remove(key);
        match removed {
            Some(broadcaster) => {
                broadcaster.fire(outcome);
                true
            }
            None => {
                warn!(key = %key, "platform resolved a key with no pending request; ignoring");
                false
            }
        }
    }

    /// Remove the entry for `key` and close it without firing.
    pub fn abandon(&self, key: &CapabilityKey) -> bool {
        let removed = self.lock().remove(key);
        match removed {
            Some(broadcaster) => {
                broadcaster.close();
                true
            }
            None => false,
        }
    }

    /// Drop every pending entry and batch, closing each broadcaster.
    ///
    /// Used when the host goes away for good. Returns the number of entries
    /// that were closed.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<Broadcaster> = {
            let mut guard = self.lock();
            guard.state.batches.clear();
            guard.state.entries.drain().map(|(_, b)| b).collect()
        };
        let count = drained.len();
        drained.iter().for_each(Broadcaster::close);
        count
    }

    /// Forget batch `batch` and return what it carried.
    pub fn take_batch(&self, batch: BatchId) -> Option<PendingBatch> {
        self.lock().close_batch(batch)
    }

    /// Number of outstanding platform batches.
    pub fn outstanding_batches(&self) -> usize {
        self.lock().state.batches.len()
    }

    pub fn len(&self) -> usize {
        self.lock().state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to the registry for the duration of one coalescing event.
pub struct PendingGuard<'a> {
    state: MutexGuard<'a, PendingState>,
}

impl PendingGuard<'_> {
    pub fn has(&self, key: &CapabilityKey) -> bool {
        self.state.entries.contains_key(key)
    }

    pub fn get(&self, key: &CapabilityKey) -> Option<Broadcaster> {
        self.state.entries.get(key).cloned()
    }

    pub fn put(&mut self, key: CapabilityKey, broadcaster: Broadcaster) -> GrantResult<()> {
        if self.state.entries.contains_key(&key) {
            return Err(GrantError::DuplicatePending { key: key.0 });
        }
        self.state.entries.insert(key, broadcaster);
        Ok(())
    }

    /// Remember that `keys` went to the platform under `batch` while the
    /// host looked like `context`.
    pub fn open_batch(&mut self, batch: BatchId, keys: Vec<CapabilityKey>, context: HostContext) {
        self.state.batches.insert(batch, PendingBatch { keys, context });
    }

    pub fn close_batch(&mut self, batch: BatchId) -> Option<PendingBatch> {
        self.state.batches.remove(&batch)
    }

    fn remove(&mut self, key: &CapabilityKey) -> Option<Broadcaster> {
        self.state.entries.remove(key)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
