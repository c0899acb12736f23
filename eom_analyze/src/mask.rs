//! Diamond mask evaluation.
//!
//! Each lane's grid is checked against the gear's diamond mask, translated
//! horizontally to the estimated eye center. Every cell is visited so the
//! verdict also carries the full failing-point and invalid-point tallies;
//! a single in-mask error already decides the lane, but the counts are what
//! an operator acts on.

use crate::center::{EyeCenter, estimate_center};
use crate::dataset::{Dataset, LaneDataset};
use eom_common::types::{ErrorCount, EyeGeometry, Gear, SweepCapabilities};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Mask outcome of one lane.
#[derive(Debug, Clone, Serialize)]
pub struct LaneVerdict {
    pub lane: u8,
    /// Eye center estimate, absent when a boundary walk was poisoned.
    pub center: Option<EyeCenter>,
    /// Horizontal mask translation in unit intervals, rounded to four
    /// decimals like the rest of the physical-unit arithmetic. Absent
    /// together with `center`.
    pub center_ui: Option<f64>,
    /// An in-mask cell carried a nonzero error count.
    pub failed: bool,
    /// The verdict cannot be trusted: either no center estimate, or an
    /// in-mask cell was never measured.
    pub indeterminate: bool,
    /// In-mask cells with a nonzero error count.
    pub failing_points: usize,
    /// In-mask cells holding the invalid sentinel.
    pub invalid_points: usize,
}

impl LaneVerdict {
    /// Presentation label. `indeterminate` wins over pass/fail; the raw
    /// `failed` flag stays available for callers that want it anyway.
    pub fn label(&self) -> &'static str {
        if self.indeterminate {
            "INDETERMINATE"
        } else if self.failed {
            "FAIL"
        } else {
            "PASS"
        }
    }

    pub fn passed(&self) -> bool {
        !self.failed && !self.indeterminate
    }
}

/// Mask outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunVerdict {
    pub gear: Gear,
    pub lanes: Vec<LaneVerdict>,
}

impl RunVerdict {
    /// A run passes only when every lane passes cleanly.
    pub fn passed(&self) -> bool {
        !self.lanes.is_empty() && self.lanes.iter().all(LaneVerdict::passed)
    }

    pub fn label(&self) -> &'static str {
        if self.lanes.iter().any(|l| l.failed) {
            "FAIL"
        } else if self.lanes.iter().any(|l| l.indeterminate) || self.lanes.is_empty() {
            "INDETERMINATE"
        } else {
            "PASS"
        }
    }
}

/// Round to four decimal places, the precision all UI/mV comparisons use.
fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Diamond membership test: taxicab distance from the mask center, with
/// each axis normalized to its half-dimension.
fn in_mask(x_ui: f64, y_mv: f64, center_ui: f64, geometry: &EyeGeometry) -> bool {
    (x_ui - center_ui).abs() / geometry.half_width_ui + y_mv.abs() / geometry.half_height_mv
        <= 1.0
}

/// Evaluate one lane against the gear mask. Visits every grid cell even
/// after the verdict is already decided.
///
/// Without a center estimate there is nowhere to anchor the mask, so the
/// grid is not scanned at all and the lane is indeterminate with the
/// `failed` flag clear.
pub fn evaluate_lane(lane: &LaneDataset, caps: &SweepCapabilities, gear: Gear) -> LaneVerdict {
    let geometry = gear.geometry();
    let Some(center) = estimate_center(lane, caps) else {
        info!(lane = lane.lane, "no eye center estimate, mask evaluation skipped");
        return LaneVerdict {
            lane: lane.lane,
            center: None,
            center_ui: None,
            failed: false,
            indeterminate: true,
            failing_points: 0,
            invalid_points: 0,
        };
    };
    let center_ui = round4(center.center as f64 * caps.timing_step());

    let mut failing_points = 0;
    let mut invalid_points = 0;
    for (&(timing, voltage), &count) in lane.iter() {
        let x_ui = round4(timing as f64 * caps.timing_step());
        let y_mv = round4(voltage as f64 * caps.voltage_step());
        if !in_mask(x_ui, y_mv, center_ui, &geometry) {
            continue;
        }
        match count {
            ErrorCount::Counted(0) => {}
            ErrorCount::Counted(n) => {
                warn!(
                    lane = lane.lane,
                    timing, voltage, errors = n,
                    "errors inside the eye mask"
                );
                failing_points += 1;
            }
            ErrorCount::Invalid => {
                debug!(lane = lane.lane, timing, voltage, "unmeasured cell inside the eye mask");
                invalid_points += 1;
            }
        }
    }

    let verdict = LaneVerdict {
        lane: lane.lane,
        center: Some(center),
        center_ui: Some(center_ui),
        failed: failing_points > 0,
        indeterminate: invalid_points > 0,
        failing_points,
        invalid_points,
    };
    info!(
        lane = verdict.lane,
        verdict = verdict.label(),
        center_ui,
        failing = verdict.failing_points,
        unmeasured = verdict.invalid_points,
        "lane evaluated"
    );
    verdict
}

/// Evaluate every lane of a parsed report.
pub fn evaluate(dataset: &Dataset) -> RunVerdict {
    let lanes = dataset
        .lanes
        .iter()
        .map(|lane| evaluate_lane(lane, &dataset.caps, dataset.gear))
        .collect();
    RunVerdict {
        gear: dataset.gear,
        lanes,
    }
}
