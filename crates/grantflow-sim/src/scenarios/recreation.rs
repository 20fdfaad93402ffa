//! Scenario 2: Host Recreation
//!
//! A caller asks for location and the platform shows the prompt. Before
//! the user answers, the host is torn down and recreated, as on a screen
//! rotation. The pending request lives in the retained registry, so the
//! recreated host:
//!
//! - lets a second caller join the prompt that is already on screen
//! - resolves the first caller when the answer finally arrives
//!
//! Final teardown then closes a request that was never answered.

use std::sync::Arc;

use futures::{join, poll, StreamExt, TryStreamExt};

use grantflow_contracts::{
    capability::keys,
    error::{GrantError, GrantResult},
    outcome::Outcome,
};
use grantflow_core::RetainedRegistry;

use crate::platform::{SimulatedPlatform, UserAnswer};

use super::{off_script, Host, ScenarioOptions};

/// What each caller received across the recreation.
#[derive(Debug, Clone)]
pub struct RecreationReport {
    /// Caller A asked on the first host instance.
    pub caller_a: Vec<Outcome>,
    /// Caller B asked on the recreated host instance.
    pub caller_b: Vec<bool>,
    /// What a request made while the host was gone produced.
    pub while_detached: Option<GrantError>,
    pub carried_over: usize,
    pub prompts: usize,
    /// Entries closed by the final teardown.
    pub closed_on_release: usize,
    /// Caller C was waiting when the host was released for good.
    pub caller_c: Vec<bool>,
}

/// Run Scenario 2: Host Recreation.
pub async fn run_scenario(options: &ScenarioOptions) -> GrantResult<RecreationReport> {
    println!("=== Scenario 2: Host Recreation ===");
    println!();

    let retained = RetainedRegistry::new();
    let platform = Arc::new(SimulatedPlatform::new());
    let location = keys(["location"]);

    // ── First host instance ───────────────────────────────────────────────────

    let first = Host::new("recreation/first", retained.get(), Arc::clone(&platform), options);
    println!("  Caller A asks for:      location");

    let mut caller_a = first.coordinator.request_each(&location)?;
    if poll!(caller_a.next()).is_ready() {
        return Err(off_script("caller A finished before the user answered"));
    }
    let batch = platform
        .last_prompt()
        .map(|prompt| prompt.batch)
        .ok_or_else(|| off_script("no prompt was shown"))?;
    println!("  Prompt shown:           batch {}", batch);

    // ── Recreation ────────────────────────────────────────────────────────────

    println!("  Host torn down for recreation (prompt still on screen)");
    first.coordinator.detach();
    platform.detach_host();

    let while_detached = match first.coordinator.request(&location)?.next().await {
        Some(Err(err)) => Some(err),
        _ => None,
    };
    if let Some(err) = &while_detached {
        println!("  Request while detached: {}", err);
    }

    platform.attach_host();
    let second = Host::new("recreation/second", retained.get(), Arc::clone(&platform), options);
    let carried_over = second.coordinator.registry().len();
    println!("  Host recreated; pending entries carried over: {}", carried_over);

    // ── Answer delivered to the recreated host ────────────────────────────────

    println!("  Caller B asks for:      location (on the recreated host)");
    let caller_b = second.coordinator.request(&location)?.try_collect::<Vec<_>>();
    let user = async {
        println!("  User answers:           location → allow");
        second
            .coordinator
            .on_batch_result(platform.answer_all(batch, UserAnswer::Allow)?)
    };
    let (caller_a, caller_b, answered) = join!(caller_a.try_collect::<Vec<_>>(), caller_b, user);
    answered?;
    let caller_a = caller_a?;
    let caller_b = caller_b?;

    for outcome in &caller_a {
        println!("  Caller A received:      {}", outcome);
    }
    println!("  Caller B received:      all granted = {}", caller_b.first().copied().unwrap_or(false));

    // ── Final teardown ────────────────────────────────────────────────────────

    println!("  Caller C asks for:      storage.read; host then released for good");
    let mut caller_c = second.coordinator.request(&keys(["storage.read"]))?;
    if poll!(caller_c.next()).is_ready() {
        return Err(off_script("caller C finished before the host was released"));
    }
    let closed_on_release = retained.release();
    let caller_c = caller_c.try_collect::<Vec<_>>().await?;
    println!(
        "  Released:               {} entry closed, caller C received {} value(s)",
        closed_on_release,
        caller_c.len()
    );

    let prompts = platform.prompts().len();
    println!("  Prompts shown in total: {}", prompts);
    first.print_trace(options)?;
    second.print_trace(options)?;
    println!("  RESULT: answer reached callers of both host instances (expected)");
    println!();

    Ok(RecreationReport {
        caller_a,
        caller_b,
        while_detached,
        carried_over,
        prompts,
        closed_on_release,
        caller_c,
    })
}
