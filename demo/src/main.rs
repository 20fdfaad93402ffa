//! grantflow simulated host: Demo CLI
//!
//! Runs one or all of the three reference scenarios against a simulated
//! platform. Each scenario uses a real `RequestCoordinator`, retained
//! registry, TOML-driven verifier and lifecycle trace.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- coalescing --trace
//!   cargo run -p demo -- recreation
//!   cargo run -p demo -- combined --config crates/grantflow-sim/config/devices.toml

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grantflow_contracts::error::GrantResult;
use grantflow_policy::GrantConfig;
use grantflow_sim::scenarios::{coalescing, combined, recreation, ScenarioOptions};

// ── CLI definition ────────────────────────────────────────────────────────────

/// grantflow: coalescing grant request coordinator demo.
///
/// Each subcommand runs one or all of the reference scenarios, showing how
/// concurrent requests share one platform prompt and how decisions reach
/// every waiting caller.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "grantflow simulated host demo",
    long_about = "Runs grantflow scenarios showing request coalescing, host recreation,\n\
                  combined results and post-grant verification."
)]
struct Cli {
    /// Grant configuration TOML. Defaults to the bundled simulator config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Turn on the lifecycle trace and print it as JSON after each scenario.
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three scenarios in sequence.
    RunAll,
    /// Scenario 1: Request Coalescing (two callers, one prompt).
    Coalescing,
    /// Scenario 2: Host Recreation (answer delivered to a recreated host).
    Recreation,
    /// Scenario 3: Combined Results (combined vs itemized, post-grant checks).
    Combined,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for the coordinator's own output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match options(&cli) {
        Ok(options) => match cli.command {
            Command::RunAll => run_all(&options).await,
            Command::Coalescing => coalescing::run_scenario(&options).await.map(drop),
            Command::Recreation => recreation::run_scenario(&options).await.map(drop),
            Command::Combined => combined::run_scenario(&options).await.map(drop),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn options(cli: &Cli) -> GrantResult<ScenarioOptions> {
    let mut options = match &cli.config {
        Some(path) => ScenarioOptions {
            config: GrantConfig::from_file(path)?,
            trace: false,
        },
        None => ScenarioOptions::bundled()?,
    };
    options.trace = cli.trace;
    Ok(options)
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_all(options: &ScenarioOptions) -> GrantResult<()> {
    coalescing::run_scenario(options).await?;
    recreation::run_scenario(options).await?;
    combined::run_scenario(options).await?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("grantflow: Coalescing Grant Request Coordinator");
    println!("Simulated Host Demo");
    println!("===============================================");
    println!();
    println!("Per trigger event, for the requested keys:");
    println!("  [1] Already granted / permanently denied keys are answered at once");
    println!("  [2] Keys with a pending request join its broadcaster");
    println!("  [3] Remaining keys go to the platform in ONE batch");
    println!("  [4] The platform's answer resolves each key once, for every caller");
    println!("  [5] Granted keys pass the post-grant check before callers see them");
    println!();
}
