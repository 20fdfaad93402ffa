//! The request coordinator: coalescing, fan-out and result combination.
//!
//! Callers ask for grants through stream transforms. Each value on a
//! caller's trigger stream starts one coalescing event for the requested
//! keys:
//!
//!   Partition → Register → Dispatch → (platform) → Resolve → Combine
//!
//! 1. Keys the platform already grants or permanently denies are answered
//!    on the spot.
//! 2. Keys with a pending request join its broadcaster.
//! 3. Every other key gets a fresh broadcaster in the registry and goes
//!    into the batch.
//! 4. A non-empty batch is sent to the platform in exactly one call.
//! 5. When the platform answers, each batched key is resolved once and the
//!    decision reaches every caller waiting on it.
//!
//! Steps 1–3 run under one registry lock, so N concurrent callers asking
//! for the same undecided key produce one prompt and N identical outcomes.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use futures::{
    future::{self, BoxFuture, FutureExt},
    stream::{self, BoxStream, FuturesUnordered, Stream, StreamExt, TryStreamExt},
};
use tracing::{debug, info, warn};

use grantflow_contracts::{
    batch::{BatchId, BatchResult},
    capability::CapabilityKey,
    error::{GrantError, GrantResult},
    host::HostContext,
    lifecycle::{LifecycleRecord, LifecycleStage},
    outcome::{CombinedOutcome, Outcome},
};

use crate::{
    registry::{Broadcaster, PendingRequestRegistry, Subscription},
    traits::{GrantVerifier, PlatformGateway, TraceSink, TrustPlatform},
};

/// One key's share of a coalescing event. Resolves to `None` if the
/// pending entry was closed without a decision.
type KeyWait = BoxFuture<'static, Option<Outcome>>;

/// How a key was routed during coalescing.
enum Route {
    Decided(Outcome),
    Waiting(Subscription),
}

/// Coordinates grant requests for one host.
///
/// Holds the shared registry, the attached platform gateway, the post-grant
/// verifier and the logging toggle. Stream-producing methods take
/// `self: &Arc<Self>` because the returned streams outlive the call.
pub struct RequestCoordinator {
    registry: Arc<PendingRequestRegistry>,
    gateway: RwLock<Option<Arc<dyn PlatformGateway>>>,
    verifier: Arc<dyn GrantVerifier>,
    trace: Option<Arc<dyn TraceSink>>,
    logging: AtomicBool,
}

impl RequestCoordinator {
    /// Create a coordinator over `registry`, attached to `gateway`.
    ///
    /// Platform grants are trusted as-is until a verifier is installed with
    /// [`with_verifier`](Self::with_verifier).
    pub fn new(registry: Arc<PendingRequestRegistry>, gateway: Arc<dyn PlatformGateway>) -> Self {
        Self {
            registry,
            gateway: RwLock::new(Some(gateway)),
            verifier: Arc::new(TrustPlatform),
            trace: None,
            logging: AtomicBool::new(false),
        }
    }

    /// Install the post-grant verification hook.
    pub fn with_verifier(mut self, verifier: Arc<dyn GrantVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Install the sink that receives lifecycle records while logging is on.
    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// The registry this coordinator routes through.
    pub fn registry(&self) -> &Arc<PendingRequestRegistry> {
        &self.registry
    }

    /// Attach (or re-attach) the host's platform gateway.
    pub fn attach(&self, gateway: Arc<dyn PlatformGateway>) {
        *self.gateway.write().unwrap_or_else(PoisonError::into_inner) = Some(gateway);
        debug!("platform gateway attached");
    }

    /// Detach the gateway, e.g. while the host is being recreated.
    ///
    /// Pending entries stay registered; a platform result delivered after
    /// re-attachment still resolves them.
    pub fn detach(&self) {
        *self.gateway.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!(pending = self.registry.len(), "platform gateway detached");
    }

    pub fn is_attached(&self) -> bool {
        self.gateway.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Switch the lifecycle trace on or off. Never changes behavior.
    pub fn set_logging(&self, enabled: bool) {
        self.logging.store(enabled, Ordering::Relaxed);
    }

    pub fn is_logging(&self) -> bool {
        self.logging.load(Ordering::Relaxed)
    }

    // ── Stream transforms ─────────────────────────────────────────────────────

    /// Map every trigger value to `true` iff all `keys` end up granted.
    ///
    /// Returns `GrantError::EmptyKeySet` immediately if `keys` is empty. If
    /// every key already has a pending request when this is called, the
    /// in-flight request counts as a trigger value of its own.
    pub fn ensure_all<S>(
        self: &Arc<Self>,
        keys: &[CapabilityKey],
        trigger: S,
    ) -> GrantResult<BoxStream<'static, GrantResult<bool>>>
    where
        S: Stream + Send + 'static,
    {
        self.all_of(keys, trigger, true)
    }

    /// Map every trigger value to one `Outcome` per key, in the order the
    /// outcomes become known.
    ///
    /// Keys the platform has already decided come out first, in request
    /// order. Keys waiting on a prompt follow as their decisions arrive, so
    /// the overall order can differ from the order of `keys`.
    pub fn ensure_each<S>(
        self: &Arc<Self>,
        keys: &[CapabilityKey],
        trigger: S,
    ) -> GrantResult<BoxStream<'static, GrantResult<Outcome>>>
    where
        S: Stream + Send + 'static,
    {
        self.each_of(keys, trigger, true)
    }

    /// Map every trigger value to one `CombinedOutcome` over all `keys`.
    pub fn ensure_combined<S>(
        self: &Arc<Self>,
        keys: &[CapabilityKey],
        trigger: S,
    ) -> GrantResult<BoxStream<'static, GrantResult<CombinedOutcome>>>
    where
        S: Stream + Send + 'static,
    {
        self.combined_of(keys, trigger, true)
    }

    /// One-shot form of [`ensure_all`](Self::ensure_all).
    pub fn request(self: &Arc<Self>, keys: &[CapabilityKey]) -> GrantResult<BoxStream<'static, GrantResult<bool>>> {
        self.all_of(keys, once(), false)
    }

    /// One-shot form of [`ensure_each`](Self::ensure_each).
    pub fn request_each(
        self: &Arc<Self>,
        keys: &[CapabilityKey],
    ) -> GrantResult<BoxStream<'static, GrantResult<Outcome>>> {
        self.each_of(keys, once(), false)
    }

    /// One-shot form of [`ensure_combined`](Self::ensure_combined).
    pub fn request_combined(
        self: &Arc<Self>,
        keys: &[CapabilityKey],
    ) -> GrantResult<BoxStream<'static, GrantResult<CombinedOutcome>>> {
        self.combined_of(keys, once(), false)
    }

    fn all_of<S>(
        self: &Arc<Self>,
        keys: &[CapabilityKey],
        trigger: S,
        race_pending: bool,
    ) -> GrantResult<BoxStream<'static, GrantResult<bool>>>
    where
        S: Stream + Send + 'static,
    {
        Ok(self
            .combined_of(keys, trigger, race_pending)?
            .map_ok(|combined| combined.granted)
            .boxed())
    }

    fn combined_of<S>(
        self: &Arc<Self>,
        keys: &[CapabilityKey],
        trigger: S,
        race_pending: bool,
    ) -> GrantResult<BoxStream<'static, GrantResult<CombinedOutcome>>>
    where
        S: Stream + Send + 'static,
    {
        let events = self.events(keys, trigger, race_pending)?;
        Ok(events
            .then(|event| async move {
                match event {
                    Ok(waits) => gather(waits)
                        .await
                        .map(|outcomes| Ok(CombinedOutcome::from_outcomes(&outcomes))),
                    Err(err) => Some(Err(err)),
                }
            })
            .filter_map(future::ready)
            .boxed())
    }

    fn each_of<S>(
        self: &Arc<Self>,
        keys: &[CapabilityKey],
        trigger: S,
        race_pending: bool,
    ) -> GrantResult<BoxStream<'static, GrantResult<Outcome>>>
    where
        S: Stream + Send + 'static,
    {
        let events = self.events(keys, trigger, race_pending)?;
        Ok(events
            .flat_map(|event| match event {
                Ok(waits) => waits
                    .into_iter()
                    .collect::<FuturesUnordered<_>>()
                    .filter_map(future::ready)
                    .map(Ok)
                    .boxed(),
                Err(err) => stream::once(future::ready(Err(err))).boxed(),
            })
            .boxed())
    }

    /// One coalescing event per trigger value (plus one for an in-flight
    /// request when racing is on).
    fn events<S>(
        self: &Arc<Self>,
        keys: &[CapabilityKey],
        trigger: S,
        race_pending: bool,
    ) -> GrantResult<BoxStream<'static, GrantResult<Vec<KeyWait>>>>
    where
        S: Stream + Send + 'static,
    {
        if keys.is_empty() {
            return Err(GrantError::EmptyKeySet);
        }
        let keys = keys.to_vec();
        let in_flight = race_pending && keys.iter().all(|key| self.registry.has(key));
        let triggers = stream::select(trigger.map(|_| ()), stream::iter(in_flight.then_some(())));

        let this = Arc::clone(self);
        Ok(triggers.map(move |()| this.coalesce(&keys)).boxed())
    }

    /// Route every key, register fresh broadcasters and send one batch.
    fn coalesce(&self, keys: &[CapabilityKey]) -> GrantResult<Vec<KeyWait>> {
        let gateway = self.gateway()?;
        let context = gateway.host_context();
        let batch = BatchId::new();
        let mut notes = Vec::new();
        let mut routes = Vec::with_capacity(keys.len());
        let mut fresh: Vec<CapabilityKey> = Vec::new();

        {
            let mut pending = self.registry.lock();

            // Query first: a failing query must leave the registry untouched.
            let decided = keys
                .iter()
                .map(|key| self.decided(gateway.as_ref(), key))
                .collect::<GrantResult<Vec<_>>>()?;

            for (key, decided) in keys.iter().zip(decided) {
                notes.push((key.clone(), LifecycleStage::Requested));

                if let Some(outcome) = decided {
                    routes.push(Route::Decided(outcome));
                } else if let Some(broadcaster) = pending.get(key) {
                    if !fresh.contains(key) {
                        notes.push((key.clone(), LifecycleStage::Coalesced));
                    }
                    routes.push(Route::Waiting(broadcaster.subscribe()));
                } else {
                    let broadcaster = Broadcaster::new();
                    routes.push(Route::Waiting(broadcaster.subscribe()));
                    pending.put(key.clone(), broadcaster)?;
                    fresh.push(key.clone());
                }
            }

            if !fresh.is_empty() {
                pending.open_batch(batch, fresh.clone(), context.clone());
            }
        }

        for (key, stage) in notes {
            self.note(&key, stage);
        }

        if !fresh.is_empty() {
            self.dispatch(gateway.as_ref(), batch, &fresh)?;
        }

        Ok(routes
            .into_iter()
            .map(|route| match route {
                Route::Decided(outcome) => future::ready(Some(self.verified(&context, outcome))).boxed(),
                Route::Waiting(subscription) => subscription.boxed(),
            })
            .collect())
    }

    /// The outcome for `key` if the platform has already decided it.
    fn decided(&self, gateway: &dyn PlatformGateway, key: &CapabilityKey) -> GrantResult<Option<Outcome>> {
        if granted_on(gateway, key)? {
            return Ok(Some(Outcome::granted(key.clone())));
        }
        if permanently_denied_on(gateway, key)? {
            return Ok(Some(Outcome::denied(key.clone())));
        }
        Ok(None)
    }

    fn dispatch(&self, gateway: &dyn PlatformGateway, batch: BatchId, keys: &[CapabilityKey]) -> GrantResult<()> {
        for key in keys {
            self.note(key, LifecycleStage::BatchSent { batch });
        }
        info!(batch = %batch, keys = %join(keys), "requesting grants from platform");

        if let Err(err) = gateway.request_batch(keys, batch) {
            warn!(batch = %batch, error = %err, "platform could not dispatch batch; abandoning its entries");
            self.abandon_batch(batch);
            return Err(err);
        }
        Ok(())
    }

    fn abandon_batch(&self, batch: BatchId) {
        for key in self.registry.take_batch(batch).map(|pending| pending.keys).unwrap_or_default() {
            if self.registry.abandon(&key) {
                self.note(&key, LifecycleStage::Abandoned);
            }
        }
    }

    // ── Platform callbacks ────────────────────────────────────────────────────

    /// Deliver the platform's answer for one batch.
    ///
    /// Each reported key is resolved once and its outcome reaches every
    /// caller waiting on it. Results under a correlation token that was
    /// never dispatched, and keys with no pending request, are logged and
    /// ignored. Batched keys the platform left unanswered are abandoned so a
    /// later request prompts again. Grants are verified against the host
    /// context captured when the batch was sent, so a result that arrives
    /// while the host is detached is still checked.
    ///
    /// # Errors
    ///
    /// `GrantError::MalformedBatchResult` if the arrays are not index-aligned;
    /// nothing is resolved in that case.
    pub fn on_batch_result(&self, result: BatchResult) -> GrantResult<()> {
        result.validate()?;

        let Some(expected) = self.registry.take_batch(result.batch) else {
            warn!(batch = %result.batch, "platform result carries an unknown correlation token; ignoring");
            return Ok(());
        };

        let BatchResult { batch, keys, granted, rationale } = result;

        for ((key, granted), rationale) in keys.iter().zip(granted).zip(rationale) {
            let outcome = self.verified(&expected.context, Outcome::new(key.clone(), granted, rationale));
            let decision = outcome.granted;
            if self.registry.resolve(key, outcome) {
                self.note(key, LifecycleStage::Resolved { granted: decision });
            }
        }

        for key in expected.keys.iter().filter(|key| !keys.contains(key)) {
            if self.registry.abandon(key) {
                warn!(key = %key, batch = %batch, "platform left a requested key unanswered; abandoning it");
                self.note(key, LifecycleStage::Abandoned);
            }
        }
        Ok(())
    }

    /// Deliver a platform answer that carries only grant flags.
    ///
    /// The rationale flag of every key is read from the gateway at callback
    /// time, then the result is handled by [`on_batch_result`](Self::on_batch_result).
    pub fn on_platform_response(
        &self,
        batch: BatchId,
        keys: Vec<CapabilityKey>,
        granted: Vec<bool>,
    ) -> GrantResult<()> {
        let gateway = self.gateway()?;
        let rationale = keys
            .iter()
            .map(|key| gateway.should_show_rationale(key))
            .collect::<GrantResult<Vec<_>>>()?;
        self.on_batch_result(BatchResult { batch, keys, granted, rationale })
    }

    // ── Synchronous queries ───────────────────────────────────────────────────

    /// Return true if the platform currently grants `key`.
    ///
    /// Always true on platforms that grant at install time.
    pub fn is_granted(&self, key: &CapabilityKey) -> GrantResult<bool> {
        granted_on(self.gateway()?.as_ref(), key)
    }

    /// Return true if `key` is denied by policy.
    ///
    /// Always false on platforms that grant at install time.
    pub fn is_permanently_denied(&self, key: &CapabilityKey) -> GrantResult<bool> {
        permanently_denied_on(self.gateway()?.as_ref(), key)
    }

    /// Return true only if the platform recommends a rationale for every key
    /// in `keys` that is not already granted.
    ///
    /// Always false on platforms without rationale support.
    pub fn should_show_rationale(&self, keys: &[CapabilityKey]) -> GrantResult<bool> {
        let gateway = self.gateway()?;
        if !gateway.supports_runtime_grants() {
            return Ok(false);
        }
        for key in keys {
            if !gateway.is_granted(key)? && !gateway.should_show_rationale(key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn gateway(&self) -> GrantResult<Arc<dyn PlatformGateway>> {
        self.gateway
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(GrantError::HostDetached)
    }

    /// Run the verifier over a granted outcome. Anything but a clean
    /// `Ok(true)` turns the grant into a denial.
    fn verified(&self, context: &HostContext, outcome: Outcome) -> Outcome {
        if !outcome.granted {
            return outcome;
        }

        let verdict = panic::catch_unwind(AssertUnwindSafe(|| self.verifier.verify(&outcome.key, context)));
        let confirmed = match verdict {
            Ok(Ok(confirmed)) => confirmed,
            Ok(Err(err)) => {
                warn!(key = %outcome.key, error = %err, "post-grant verification failed; treating as denied");
                false
            }
            Err(_) => {
                warn!(key = %outcome.key, "post-grant verification panicked; treating as denied");
                false
            }
        };

        if !confirmed {
            debug!(key = %outcome.key, "platform grant vetoed by verifier");
        }
        Outcome { granted: confirmed, ..outcome }
    }

    fn note(&self, key: &CapabilityKey, stage: LifecycleStage) {
        if !self.is_logging() {
            return;
        }
        debug!(key = %key, stage = ?stage, "grant lifecycle");
        if let Some(trace) = &self.trace {
            trace.record(LifecycleRecord::now(key.clone(), stage));
        }
    }
}

fn granted_on(gateway: &dyn PlatformGateway, key: &CapabilityKey) -> GrantResult<bool> {
    Ok(!gateway.supports_runtime_grants() || gateway.is_granted(key)?)
}

fn permanently_denied_on(gateway: &dyn PlatformGateway, key: &CapabilityKey) -> GrantResult<bool> {
    Ok(gateway.supports_runtime_grants() && gateway.is_permanently_denied(key)?)
}

/// Wait for every key; `None` if any entry was closed without a decision.
async fn gather(waits: Vec<KeyWait>) -> Option<Vec<Outcome>> {
    future::join_all(waits).await.into_iter().collect()
}

fn once() -> stream::Once<future::Ready<()>> {
    stream::once(future::ready(()))
}

fn join(keys: &[CapabilityKey]) -> String {
    keys.iter().map(CapabilityKey::as_str).collect::<Vec<_>>().join(", ")
}
