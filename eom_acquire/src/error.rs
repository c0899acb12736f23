//! Acquisition error taxonomy.
//!
//! Every variant here is fatal for the running acquisition: a failed
//! register read is never retried, and the sweep loop guarantees the EOM
//! test control register is disabled on the way out regardless of which
//! variant aborted it.

use eom_common::types::CapabilityError;
use thiserror::Error;

/// Errors aborting an acquisition run.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// A register read returned no value (transport failure).
    #[error("register read failed: attribute {attr:#06x}, lane {lane:?}")]
    Transport { attr: u16, lane: Option<u8> },

    /// RX_EYEMON_Capability reports no Eye-Opening-Monitor.
    #[error("EOM is not supported by this PHY")]
    NotSupported,

    /// Sweep capabilities cannot produce a usable grid.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Link gear below the minimum validated gear.
    #[error("unsupported gear HS-G{0}, minimum is HS-G4")]
    UnsupportedGear(u8),

    /// Requested single voltage outside the sweep envelope.
    #[error("voltage {voltage} outside +-{max} steps")]
    InvalidVoltage { voltage: i32, max: u32 },

    /// A link traffic burst could not be issued mid-poll.
    #[error("link traffic burst failed")]
    TrafficFailed,

    /// Polling budget exhausted while waiting for the monitor to stop.
    #[error("EOM did not stop within {attempts} polls")]
    PollBudgetExhausted { attempts: u32 },

    /// User interrupt (Ctrl-C) observed between scan points.
    #[error("acquisition interrupted")]
    Interrupted,

    /// Report file I/O failure.
    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),
}
