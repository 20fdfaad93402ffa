//! # grantflow-sim
//!
//! Simulated host for the grantflow request coordinator.
//!
//! [`SimulatedPlatform`] implements `PlatformGateway` with scripted user
//! answers, and the scenarios show the coordinator end to end:
//!
//! 1. **Request Coalescing**: two callers, one prompt, identical decisions.
//! 2. **Host Recreation**: a prompt answered after the host was recreated
//!    still reaches the callers of the old instance.
//! 3. **Combined Results**: combined and itemized views of one prompt, with
//!    a post-grant check overriding the platform on a listed device.
//!
//! No real platform is involved; all state lives in memory.

pub mod platform;
pub mod scenarios;

pub use platform::{GrantState, Prompt, SimulatedPlatform, UserAnswer};
pub use scenarios::ScenarioOptions;
