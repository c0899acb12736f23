//! # EOM Analysis Binary
//!
//! Reads a `.eom` sweep report, reconstructs the per-lane eye diagram,
//! and checks it against the gear's diamond eye mask.
//!
//! # Usage
//!
//! ```bash
//! # Human-readable verdict
//! eom_analyze local_lane_0_1_ttc_93.eom
//!
//! # Machine-readable summary on stdout
//! eom_analyze --json local_lane_0_1_ttc_93.eom
//! ```
//!
//! Exits 0 on a clean PASS, 2 on FAIL or INDETERMINATE, 1 when the report
//! itself cannot be analyzed.

#![deny(warnings)]

use clap::Parser;
use eom_analyze::dataset::{Dataset, DatasetBuilder};
use eom_analyze::mask::{RunVerdict, evaluate};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// UFS EOM analysis - eye mask evaluation of a recorded sweep
#[derive(Parser, Debug)]
#[command(name = "eom_analyze")]
#[command(version)]
#[command(about = "UFS M-PHY Eye-Opening-Monitor report analysis")]
#[command(long_about = None)]
struct Args {
    /// Path to the .eom report produced by the acquisition tool
    report: PathBuf,

    /// Print the summary as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    let verdict = match analyze(&args) {
        Ok(verdict) => verdict,
        Err(e) => {
            error!("analysis failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = print_summary(&args, &verdict) {
        error!("writing summary failed: {e}");
        std::process::exit(1);
    }

    if !verdict.passed() {
        std::process::exit(2);
    }
}

fn analyze(args: &Args) -> Result<RunVerdict, Box<dyn std::error::Error>> {
    info!("analyzing {}", args.report.display());

    let file = File::open(&args.report)?;
    let dataset = DatasetBuilder::new().read_from(BufReader::new(file))?;
    log_dataset(&dataset);

    Ok(evaluate(&dataset))
}

fn log_dataset(dataset: &Dataset) {
    if let Some(side) = &dataset.side {
        info!("report side: {side}");
    }
    info!(
        "link speed {}, grid {} x {} steps ({:.4} UI x {:.1} mV per step)",
        dataset.gear,
        2 * dataset.caps.timing_max_steps + 1,
        2 * dataset.caps.voltage_max_steps + 1,
        dataset.caps.timing_step(),
        dataset.caps.voltage_step(),
    );
    for lane in &dataset.lanes {
        if lane.observed_holes > 0 {
            warn!(
                lane = lane.lane,
                holes = lane.observed_holes,
                "report is missing measurements inside the swept span"
            );
        }
    }
}

fn print_summary(args: &Args, verdict: &RunVerdict) -> Result<(), Box<dyn std::error::Error>> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(verdict)?);
        return Ok(());
    }

    for lane in &verdict.lanes {
        match (lane.center, lane.center_ui) {
            (Some(c), Some(center_ui)) => println!(
                "lane {}: {} (eye width {} steps, center {center_ui:+.4} UI, \
                 {} failing / {} unmeasured in mask)",
                lane.lane,
                lane.label(),
                c.eye_width(),
                lane.failing_points,
                lane.invalid_points,
            ),
            _ => println!(
                "lane {}: {} (no eye center estimate, mask not evaluated)",
                lane.lane,
                lane.label()
            ),
        }
    }
    println!("{} eye mask: {}", verdict.gear, verdict.label());
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
