//! Core data model for EOM acquisition and analysis.
//!
//! This module defines:
//! - [`Side`] / [`Direction`] - which end of the link and which UIC selector
//! - [`Gear`] / [`EyeGeometry`] - PHY speed mode and its eye mask dimensions
//! - [`SweepCapabilities`] - the per-run sweep envelope read from the PHY
//! - [`ErrorCount`] / [`ScanPoint`] - one measurement of the sweep grid
//!
//! `SweepCapabilities` is read once per acquisition and passed by value into
//! the analysis stages. It is never shared global state.

use crate::consts::{EOM_INVALID_ERROR_COUNT, EOM_MIN_GEAR, EOM_TARGET_TEST_COUNT_MAX};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which receiver the sweep targets: the host controller (`Local`) or the
/// UFS device (`Peer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Host controller Rx.
    Local,
    /// UFS device Rx.
    Peer,
}

impl Side {
    /// Name used in the report header line (`UFS Host Side Eye Monitor Start`).
    pub fn report_name(&self) -> &'static str {
        match self {
            Side::Local => "Host",
            Side::Peer => "Device",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Peer => write!(f, "peer"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Side::Local),
            "peer" => Ok(Side::Peer),
            other => Err(format!("expected 'local' or 'peer', got '{other}'")),
        }
    }
}

/// UIC attribute selector direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => write!(f, "RX"),
            Direction::Tx => write!(f, "TX"),
        }
    }
}

/// PHY high-speed gear. Construction enforces the minimum validated gear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gear(u8);

impl Gear {
    /// Create a gear, rejecting anything below [`EOM_MIN_GEAR`].
    pub fn new(gear: u8) -> Option<Self> {
        (gear >= EOM_MIN_GEAR).then_some(Gear(gear))
    }

    /// Numeric gear value.
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Eye mask dimensions mandated for this gear.
    ///
    /// Gear 4 and Gear 5 masks are standard-defined; gears above 5 keep the
    /// Gear 5 dimensions until a tighter mask is published.
    pub fn geometry(&self) -> EyeGeometry {
        match self.0 {
            4 => EyeGeometry {
                half_width_ui: 0.24,
                half_height_mv: 40.0,
            },
            _ => EyeGeometry {
                half_width_ui: 0.15,
                half_height_mv: 30.0,
            },
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HS-G{}", self.0)
    }
}

/// Half-dimensions of the diamond eye mask, in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeGeometry {
    /// Half width of the diamond, in unit intervals.
    pub half_width_ui: f64,
    /// Half height of the diamond, in millivolts.
    pub half_height_mv: f64,
}

/// Errors detected when validating [`SweepCapabilities`].
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// Timing steps or offset capability is zero.
    #[error("timing step size is zero (max_steps={steps}, max_offset={offset})")]
    ZeroTimingStep { steps: u32, offset: i32 },

    /// Voltage steps or offset capability is zero.
    #[error("voltage step size is zero (max_steps={steps}, max_offset={offset})")]
    ZeroVoltageStep { steps: u32, offset: i32 },

    /// Target test count outside the 7-bit register range.
    #[error("target test count {0} outside 1..={EOM_TARGET_TEST_COUNT_MAX}")]
    BadTargetTestCount(u8),
}

/// Sweep envelope of the Eye-Opening-Monitor, read from the capability
/// attributes once per acquisition run and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepCapabilities {
    /// Maximum timing offset magnitude, in register steps.
    pub timing_max_steps: u32,
    /// Maximum timing offset, in hundredths of a unit interval.
    pub timing_max_offset: i32,
    /// Maximum voltage offset magnitude, in register steps.
    pub voltage_max_steps: u32,
    /// Maximum voltage offset, in tens of millivolts.
    pub voltage_max_offset: i32,
    /// RX_EYEMON_Target_Test_Count programmed for every point.
    pub target_test_count: u8,
}

impl SweepCapabilities {
    /// Unit intervals per timing register step.
    pub fn timing_step(&self) -> f64 {
        (self.timing_max_offset as f64 * 0.01) / self.timing_max_steps as f64
    }

    /// Millivolts per voltage register step.
    pub fn voltage_step(&self) -> f64 {
        (self.voltage_max_offset as f64 * 10.0) / self.voltage_max_steps as f64
    }

    /// Number of cells in the full timing x voltage grid.
    pub fn grid_len(&self) -> usize {
        (2 * self.timing_max_steps as usize + 1) * (2 * self.voltage_max_steps as usize + 1)
    }

    /// Full signed timing sweep range.
    pub fn timing_range(&self) -> std::ops::RangeInclusive<i32> {
        -(self.timing_max_steps as i32)..=(self.timing_max_steps as i32)
    }

    /// Full signed voltage sweep range.
    pub fn voltage_range(&self) -> std::ops::RangeInclusive<i32> {
        -(self.voltage_max_steps as i32)..=(self.voltage_max_steps as i32)
    }

    /// Reject capability sets that cannot produce a usable grid.
    pub fn validate(&self) -> Result<(), CapabilityError> {
        if self.timing_max_steps == 0 || self.timing_max_offset == 0 {
            return Err(CapabilityError::ZeroTimingStep {
                steps: self.timing_max_steps,
                offset: self.timing_max_offset,
            });
        }
        if self.voltage_max_steps == 0 || self.voltage_max_offset == 0 {
            return Err(CapabilityError::ZeroVoltageStep {
                steps: self.voltage_max_steps,
                offset: self.voltage_max_offset,
            });
        }
        if self.target_test_count == 0 || self.target_test_count > EOM_TARGET_TEST_COUNT_MAX {
            return Err(CapabilityError::BadTargetTestCount(self.target_test_count));
        }
        Ok(())
    }
}

/// Bit-error count of one scan point, or the reserved sentinel for a grid
/// cell no measurement was recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCount {
    /// Measured error count.
    Counted(u32),
    /// No measurement available for this cell.
    Invalid,
}

impl ErrorCount {
    /// Decode the raw report value, mapping the sentinel to `Invalid`.
    pub fn from_raw(raw: u32) -> Self {
        if raw == EOM_INVALID_ERROR_COUNT {
            ErrorCount::Invalid
        } else {
            ErrorCount::Counted(raw)
        }
    }

    /// Raw report value, mapping `Invalid` back to the sentinel.
    pub fn to_raw(&self) -> u32 {
        match self {
            ErrorCount::Counted(n) => *n,
            ErrorCount::Invalid => EOM_INVALID_ERROR_COUNT,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ErrorCount::Invalid)
    }
}

/// One accepted measurement of the sweep, uniquely keyed by
/// `(lane, timing, voltage)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPoint {
    /// PHY lane, 0 or 1.
    pub lane: u8,
    /// Signed timing offset in register steps.
    pub timing: i32,
    /// Signed voltage offset in register steps.
    pub voltage: i32,
    /// Measured error count (or the sentinel).
    pub error_count: ErrorCount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> SweepCapabilities {
        SweepCapabilities {
            timing_max_steps: 16,
            timing_max_offset: 32,
            voltage_max_steps: 8,
            voltage_max_offset: 16,
            target_test_count: 0x5D,
        }
    }

    #[test]
    fn step_sizes_follow_capability_formulas() {
        let c = caps();
        assert!((c.timing_step() - 0.02).abs() < 1e-12);
        assert!((c.voltage_step() - 20.0).abs() < 1e-12);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn zero_steps_rejected() {
        let mut c = caps();
        c.timing_max_steps = 0;
        assert!(matches!(
            c.validate(),
            Err(CapabilityError::ZeroTimingStep { .. })
        ));

        let mut c = caps();
        c.voltage_max_offset = 0;
        assert!(matches!(
            c.validate(),
            Err(CapabilityError::ZeroVoltageStep { .. })
        ));
    }

    #[test]
    fn target_test_count_bounds() {
        let mut c = caps();
        c.target_test_count = 0;
        assert!(c.validate().is_err());
        c.target_test_count = 0x80;
        assert!(c.validate().is_err());
        c.target_test_count = 0x7F;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn grid_len_covers_full_cross_product() {
        let c = caps();
        assert_eq!(c.grid_len(), 33 * 17);
        assert_eq!(
            c.grid_len(),
            c.timing_range().count() * c.voltage_range().count()
        );
    }

    #[test]
    fn gear_construction_and_geometry() {
        assert!(Gear::new(3).is_none());
        let g4 = Gear::new(4).unwrap();
        assert_eq!(g4.geometry().half_width_ui, 0.24);
        assert_eq!(g4.geometry().half_height_mv, 40.0);
        let g5 = Gear::new(5).unwrap();
        assert_eq!(g5.geometry().half_width_ui, 0.15);
        assert_eq!(g5.geometry().half_height_mv, 30.0);
        assert_eq!(g5.to_string(), "HS-G5");
    }

    #[test]
    fn error_count_sentinel_round_trip() {
        assert_eq!(ErrorCount::from_raw(999), ErrorCount::Invalid);
        assert_eq!(ErrorCount::from_raw(0), ErrorCount::Counted(0));
        assert_eq!(ErrorCount::Invalid.to_raw(), 999);
        assert!(ErrorCount::Invalid.is_invalid());
        assert!(!ErrorCount::Counted(60).is_invalid());
    }

    #[test]
    fn side_parsing_and_report_names() {
        assert_eq!("local".parse::<Side>().unwrap(), Side::Local);
        assert_eq!("peer".parse::<Side>().unwrap(), Side::Peer);
        assert!("host".parse::<Side>().is_err());
        assert_eq!(Side::Local.report_name(), "Host");
        assert_eq!(Side::Peer.report_name(), "Device");
    }
}
