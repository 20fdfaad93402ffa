//! Scenario 3: Combined Results and Post-Grant Verification
//!
//! Runs on a device listed under `special_devices`, where storage grants
//! are only real if a test write succeeds. The user allows storage and
//! camera in one prompt, but the storage check fails on this device:
//!
//! - the combined caller sees one record that is not granted
//! - the itemized caller sees camera granted and storage denied
//! - asking again later still reports storage denied, without a prompt
//!
//! Finally the same request runs on an install-time platform, where every
//! capability is granted and no prompt is ever shown.

use std::sync::Arc;

use futures::{join, TryStreamExt};

use grantflow_contracts::{
    capability::keys,
    error::GrantResult,
    outcome::{CombinedOutcome, Outcome},
};
use grantflow_core::PendingRequestRegistry;

use crate::platform::{SimulatedPlatform, UserAnswer};

use super::{off_script, yes_no, Host, ScenarioOptions};

#[derive(Debug, Clone)]
pub struct CombinedReport {
    pub rationale_before: bool,
    pub combined: Vec<CombinedOutcome>,
    pub itemized: Vec<Outcome>,
    /// Storage asked for again after the user allowed it.
    pub repeat: Vec<bool>,
    pub prompts: usize,
    pub install_time: Vec<CombinedOutcome>,
    pub install_time_prompts: usize,
}

/// Run Scenario 3: Combined Results and Post-Grant Verification.
pub async fn run_scenario(options: &ScenarioOptions) -> GrantResult<CombinedReport> {
    println!("=== Scenario 3: Combined Results and Post-Grant Verification ===");
    println!();

    let platform = Arc::new(
        SimulatedPlatform::new()
            .with_brand("xiaomi")
            .with_attribute("storage.writable", "no"),
    );
    let host = Host::new(
        "combined",
        Arc::new(PendingRequestRegistry::new()),
        Arc::clone(&platform),
        options,
    );
    let coordinator = &host.coordinator;
    let wanted = keys(["storage.write", "camera"]);

    println!("  Device:                 xiaomi (storage not writable)");
    let rationale_before = coordinator.should_show_rationale(&wanted)?;
    println!("  Explain before asking?  {}", yes_no(rationale_before));

    // ── One prompt, two views of the result ───────────────────────────────────

    let combined = coordinator.request_combined(&wanted)?.try_collect::<Vec<_>>();
    let itemized = coordinator.request_each(&wanted)?.try_collect::<Vec<_>>();
    let user = async {
        let prompt = platform
            .last_prompt()
            .ok_or_else(|| off_script("no prompt was shown"))?;
        println!("  User answers:           storage.write → allow, camera → allow");
        coordinator.on_batch_result(platform.answer_all(prompt.batch, UserAnswer::Allow)?)
    };
    let (combined, itemized, answered) = join!(combined, itemized, user);
    answered?;
    let combined = combined?;
    let itemized = itemized?;

    for record in &combined {
        println!("  Combined caller:        {}", record);
    }
    for outcome in &itemized {
        println!("  Itemized caller:        {}", outcome);
    }

    // ── Asking again: the platform says granted, the check still says no ─────

    let repeat = coordinator
        .request(&keys(["storage.write"]))?
        .try_collect::<Vec<_>>()
        .await?;
    println!("  Storage asked again:    all granted = {}", repeat.first().copied().unwrap_or(false));

    let prompts = platform.prompts().len();
    println!("  Prompts shown:          {}", prompts);
    host.print_trace(options)?;
    println!();

    // ── Install-time platform ─────────────────────────────────────────────────

    let legacy = Arc::new(SimulatedPlatform::install_time());
    let legacy_host = Host::new(
        "combined/install-time",
        Arc::new(PendingRequestRegistry::new()),
        Arc::clone(&legacy),
        &ScenarioOptions::default(),
    );
    let install_time = legacy_host
        .coordinator
        .request_combined(&keys(["camera", "microphone"]))?
        .try_collect::<Vec<_>>()
        .await?;
    let install_time_prompts = legacy.prompts().len();
    for record in &install_time {
        println!("  Install-time platform:  {} ({} prompt(s))", record, install_time_prompts);
    }

    println!("  RESULT: verification overrode the storage grant (expected)");
    println!();

    Ok(CombinedReport {
        rationale_before,
        combined,
        itemized,
        repeat,
        prompts,
        install_time,
        install_time_prompts,
    })
}
