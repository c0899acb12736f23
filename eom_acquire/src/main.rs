//! # EOM Acquisition Binary
//!
//! Sweeps the UFS M-PHY Eye-Opening-Monitor over a lane's timing x voltage
//! grid and writes the measurements to a `.eom` report for offline
//! analysis.
//!
//! # Usage
//!
//! ```bash
//! # Sweep both lanes of the host-side receiver
//! eom_acquire --side local --lsufs_path /data/lsufs --device_path /dev/ufs-bsg0
//!
//! # Device-side receiver, lane 1 only, single voltage row
//! eom_acquire --side peer --lane 1 --voltage 0 \
//!     --lsufs_path /data/lsufs --device_path /dev/ufs-bsg0
//! ```

#![deny(warnings)]

use clap::Parser;
use eom_acquire::core::{EomAcquisition, SweepPlan};
use eom_acquire::lsufs::LsufsCli;
use eom_common::consts::EOM_TARGET_TEST_COUNT_DEFAULT;
use eom_common::types::Side;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// UFS EOM acquisition - receiver margin sweep over the on-silicon monitor
#[derive(Parser, Debug)]
#[command(name = "eom_acquire")]
#[command(version)]
#[command(about = "UFS M-PHY Eye-Opening-Monitor sweep acquisition")]
#[command(long_about = None)]
struct Args {
    /// Receiver under test: 'local' (host Rx) or 'peer' (device Rx)
    #[arg(long)]
    side: Side,

    /// Lane number 0 or 1; all connected lanes if not given
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    lane: Option<u8>,

    /// Collect data for this voltage step only
    #[arg(long, allow_hyphen_values = true)]
    voltage: Option<i32>,

    /// Target test count per point (1..=127)
    #[arg(long, default_value_t = EOM_TARGET_TEST_COUNT_DEFAULT,
          value_parser = clap::value_parser!(u8).range(1..=127))]
    target: u8,

    /// Path to the lsufs CLI on the target device
    #[arg(long)]
    lsufs_path: String,

    /// Path to the UFS BSG device node, e.g. /dev/ufs-bsg0
    #[arg(long)]
    device_path: String,

    /// Generate link traffic while each point is measured
    #[arg(long)]
    io: bool,

    /// Directory the report file is written to
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("acquisition failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("EOM acquisition v{} starting...", env!("CARGO_PKG_VERSION"));

    for path in [&args.lsufs_path, &args.device_path] {
        if !LsufsCli::probe_path(path) {
            return Err(format!("invalid path on target: {path}").into());
        }
    }

    let plan = SweepPlan {
        lane: args.lane,
        voltage: args.voltage,
        target_test_count: args.target,
        exercise_io: args.io,
    };

    let report_name = format!(
        "{}_lane_{}_ttc_{}.eom",
        args.side,
        plan.lane_label(),
        args.target
    );
    let report_path = args.output.join(&report_name);
    let report = File::create(&report_path)?;

    let cli = LsufsCli::new(&args.lsufs_path, &args.device_path, args.side);
    if args.io && !cli.prepare_traffic_file() {
        return Err("could not seed the traffic scratch file on the target".into());
    }
    let inquiry_id = cli.inquiry_id();
    if let Some(ref id) = inquiry_id {
        info!("UFS INQUIRY ID: {id}");
    }

    let acquisition = EomAcquisition::new(cli, args.side);

    let running = acquisition.running_flag();
    ctrlc::set_handler(move || {
        info!("received interrupt, stopping sweep");
        running.store(false, Ordering::SeqCst);
    })?;

    let stats = acquisition.run(&plan, inquiry_id.as_deref(), report)?;

    info!(
        "EOM results saved to {} ({} points, {:.1} s)",
        report_path.display(),
        stats.points,
        stats.elapsed.as_secs_f64()
    );
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

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
