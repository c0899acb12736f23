//! Analysis error taxonomy.
//!
//! Everything here is fatal for the whole analysis run: a report with bad
//! lines or a broken header is untrustworthy end to end, so there are no
//! partial results. Missing grid cells are deliberately *not* errors — they
//! degrade the affected lane's verdict to indeterminate instead.

use eom_common::types::CapabilityError;
use thiserror::Error;

/// Errors aborting an analysis run.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Measurement lines that failed numeric decoding.
    #[error("{0} bad data line(s) in the report, dataset is untrustworthy")]
    BadLines(usize),

    /// Capability header lines absent from the report.
    #[error("missing capability header (TimingMaxSteps/VoltageMaxSteps lines)")]
    MissingCapabilities,

    /// Capability values cannot produce a usable grid.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// No `HS-G<digit>` token anywhere in the report.
    #[error("no gear token in the report, cannot select an eye mask")]
    MissingGear,

    /// Gear below the minimum validated gear.
    #[error("unsupported gear HS-G{0}, minimum is HS-G4")]
    UnsupportedGear(u8),

    /// Measurement line naming a lane the PHY does not have.
    #[error("wrong lane number {lane} on line {line}")]
    BadLane { lane: i64, line: usize },

    /// Report file I/O failure.
    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),
}
