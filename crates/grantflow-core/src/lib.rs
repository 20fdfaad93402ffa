//! # grantflow-core
//!
//! The coalescing grant request runtime.
//!
//! This crate provides:
//! - The host-side traits (`PlatformGateway`, `GrantVerifier`, `TraceSink`)
//! - The `PendingRequestRegistry` and its single-fire `Broadcaster`
//! - The `RequestCoordinator` that turns trigger streams into grant outcomes
//! - `RetainedRegistry`, the host-scoped holder that survives recreation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grantflow_core::{RequestCoordinator, RetainedRegistry};
//!
//! let retained = RetainedRegistry::new();
//! let coordinator = Arc::new(RequestCoordinator::new(retained.get(), gateway));
//! let granted = coordinator.request(&keys(["camera"]))?;
//! ```

pub mod coordinator;
pub mod host;
pub mod registry;
pub mod traits;

pub use coordinator::RequestCoordinator;
pub use host::RetainedRegistry;
pub use registry::{Broadcaster, PendingBatch, PendingRequestRegistry};
