//! Reference scenarios for the simulated host.
//!
//! Each scenario wires a real `RequestCoordinator` to a `SimulatedPlatform`,
//! plays the user's part by answering the prompts the platform shows, and
//! prints what every caller received. Each returns a report so the outcome
//! can be checked without parsing the printed text.

pub mod coalescing;
pub mod combined;
pub mod recreation;

use std::sync::Arc;

use grantflow_contracts::{
    error::{GrantError, GrantResult},
    host::HostContext,
};
use grantflow_core::{PendingRequestRegistry, RequestCoordinator};
use grantflow_policy::{GrantConfig, TomlGrantVerifier};
use grantflow_trace::InMemoryTrace;

use crate::platform::SimulatedPlatform;

/// The configuration shipped with the simulator.
pub const BUNDLED_CONFIG: &str = include_str!("../../config/devices.toml");

/// Knobs shared by every scenario.
#[derive(Debug, Clone, Default)]
pub struct ScenarioOptions {
    pub config: GrantConfig,
    /// Switch the lifecycle trace on and print it after the scenario.
    pub trace: bool,
}

impl ScenarioOptions {
    /// Options built from [`BUNDLED_CONFIG`].
    pub fn bundled() -> GrantResult<Self> {
        Ok(Self {
            config: GrantConfig::from_toml_str(BUNDLED_CONFIG)?,
            trace: false,
        })
    }

    fn logging(&self) -> bool {
        self.trace || self.config.logging
    }
}

/// Build the verifier the simulated host uses: the configured rules plus
/// the checks the host knows how to run.
pub fn verifier(config: &GrantConfig) -> TomlGrantVerifier {
    let mut verifier = TomlGrantVerifier::new(config.verification.clone());
    verifier.register_check(
        "storage",
        Box::new(|_, ctx| Ok(attribute_is(ctx, "storage.writable", "yes"))),
    );
    verifier.register_check(
        "camera",
        Box::new(|_, ctx| Ok(!attribute_is(ctx, "camera.blocked", "yes"))),
    );
    verifier
}

fn attribute_is(ctx: &HostContext, name: &str, value: &str) -> bool {
    ctx.attributes.get(name).is_some_and(|v| v == value)
}

/// One simulated host instance: its coordinator and its trace.
pub(crate) struct Host {
    pub(crate) coordinator: Arc<RequestCoordinator>,
    pub(crate) trace: InMemoryTrace,
}

impl Host {
    pub(crate) fn new(
        session: &str,
        registry: Arc<PendingRequestRegistry>,
        platform: Arc<SimulatedPlatform>,
        options: &ScenarioOptions,
    ) -> Self {
        let trace = InMemoryTrace::new(session);
        let coordinator = RequestCoordinator::new(registry, platform)
            .with_verifier(Arc::new(verifier(&options.config)))
            .with_trace(Arc::new(trace.clone()));
        coordinator.set_logging(options.logging());
        Self {
            coordinator: Arc::new(coordinator),
            trace,
        }
    }

    /// Print the lifecycle trace as JSON if the options ask for it.
    pub(crate) fn print_trace(&self, options: &ScenarioOptions) -> GrantResult<()> {
        if options.trace {
            println!("  Lifecycle trace ({} event(s)):", self.trace.len());
            println!("{}", self.trace.export_log().to_json()?);
        }
        Ok(())
    }
}

/// The error a scenario reports when the simulation went off script.
pub(crate) fn off_script(reason: &str) -> GrantError {
    GrantError::Platform {
        reason: format!("scenario went off script: {}", reason),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
