//! Scenario 1: Request Coalescing
//!
//! Two callers ask for overlapping capabilities before the user has seen
//! any prompt. Only one prompt is shown and both callers receive the same
//! decision for the shared key. Later trigger events re-check without
//! prompting, and a denied key is asked for again with a rationale.

use std::sync::Arc;

use futures::{join, stream, TryStreamExt};

use grantflow_contracts::{
    capability::{keys, CapabilityKey},
    error::{GrantError, GrantResult},
    outcome::{CombinedOutcome, Outcome},
};
use grantflow_core::PendingRequestRegistry;

use crate::platform::{SimulatedPlatform, UserAnswer};

use super::{off_script, yes_no, Host, ScenarioOptions};

/// What each caller received.
#[derive(Debug, Clone)]
pub struct CoalescingReport {
    /// Keys of the one prompt both callers shared.
    pub shared_prompt: Vec<CapabilityKey>,
    pub caller_a: Vec<Outcome>,
    pub caller_b: Vec<bool>,
    /// One emission per resume event, with no prompt shown.
    pub resumed: Vec<bool>,
    pub rationale_before_retry: bool,
    pub retry: Vec<CombinedOutcome>,
    pub rationale_after_retry: bool,
    pub prompts: usize,
    pub pending_after: usize,
}

/// Run Scenario 1: Request Coalescing.
pub async fn run_scenario(options: &ScenarioOptions) -> GrantResult<CoalescingReport> {
    println!("=== Scenario 1: Request Coalescing ===");
    println!();

    let platform = Arc::new(SimulatedPlatform::new().with_brand("pixel"));
    let host = Host::new(
        "coalescing",
        Arc::new(PendingRequestRegistry::new()),
        Arc::clone(&platform),
        options,
    );
    let coordinator = &host.coordinator;

    let camera = CapabilityKey::new("camera");
    let microphone = CapabilityKey::new("microphone");

    // ── Part A: two callers, one prompt ───────────────────────────────────────

    println!("  Caller A asks for: camera, microphone (one outcome per key)");
    println!("  Caller B asks for: camera (all granted?)");

    let caller_a = coordinator
        .request_each(&[camera.clone(), microphone.clone()])?
        .try_collect::<Vec<_>>();
    let caller_b = coordinator.request(&[camera.clone()])?.try_collect::<Vec<_>>();
    let user = async {
        let prompt = platform
            .last_prompt()
            .ok_or_else(|| off_script("no prompt was shown"))?;
        println!("  Prompts on screen:      {}", platform.prompts().len());
        println!("  User answers:           camera → allow, microphone → deny");
        let result = platform.answer(
            prompt.batch,
            &[(camera.clone(), UserAnswer::Allow), (microphone.clone(), UserAnswer::Deny)],
        )?;
        coordinator.on_batch_result(result)?;
        Ok::<_, GrantError>(prompt.keys)
    };

    let (caller_a, caller_b, shared_prompt) = join!(caller_a, caller_b, user);
    let shared_prompt: Vec<CapabilityKey> = shared_prompt?;
    let caller_a = caller_a?;
    let caller_b = caller_b?;

    for outcome in &caller_a {
        println!("  Caller A received:      {}", outcome);
    }
    println!("  Caller B received:      all granted = {}", caller_b.first().copied().unwrap_or(false));
    println!();

    // ── Part B: resume events re-check without prompting ─────────────────────

    let resumes = stream::iter(["resume", "resume"]);
    let resumed = coordinator
        .ensure_all(&[camera.clone()], resumes)?
        .try_collect::<Vec<_>>()
        .await?;
    println!("  Two resume events:      {:?} (no new prompt)", resumed);
    println!();

    // ── Part C: ask again for the denied key ──────────────────────────────────

    let rationale_before_retry = coordinator.should_show_rationale(&[microphone.clone()])?;
    println!("  Explain microphone?     {}", yes_no(rationale_before_retry));

    let retry = coordinator
        .request_combined(&[microphone.clone()])?
        .try_collect::<Vec<_>>();
    let user = async {
        let prompt = platform
            .last_prompt()
            .ok_or_else(|| off_script("no retry prompt was shown"))?;
        println!("  User answers:           microphone → deny, don't ask again");
        coordinator.on_batch_result(platform.answer_all(prompt.batch, UserAnswer::DenyDontAskAgain)?)
    };
    let (retry, answered) = join!(retry, user);
    answered?;
    let retry = retry?;

    for combined in &retry {
        println!(
            "  Retry result:           granted = {}, rationale = {}",
            combined.granted, combined.rationale_recommended
        );
    }

    let rationale_after_retry = coordinator.should_show_rationale(&keys(["microphone"]))?;
    println!("  Explain microphone?     {}", yes_no(rationale_after_retry));

    let prompts = platform.prompts().len();
    let pending_after = coordinator.registry().len();
    println!("  Prompts shown in total: {}", prompts);
    println!("  Pending entries left:   {}", pending_after);
    host.print_trace(options)?;
    println!("  RESULT: one prompt per undecided key, identical decisions (expected)");
    println!();

    Ok(CoalescingReport {
        shared_prompt,
        caller_a,
        caller_b,
        resumed,
        rationale_before_retry,
        retry,
        rationale_after_retry,
        prompts,
        pending_after,
    })
}
