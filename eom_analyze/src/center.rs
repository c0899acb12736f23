//! Eye center estimation on the zero-voltage row.
//!
//! Walks outward from timing 0 in both directions looking for the error
//! onset. A walk that reaches an `Invalid` cell before finding its stop
//! condition poisons the whole estimate: without a trustworthy boundary
//! there is no center, and the lane's mask evaluation is skipped.

use crate::dataset::LaneDataset;
use eom_common::types::{ErrorCount, SweepCapabilities};
use serde::Serialize;

/// Resolved eye center of one lane, in timing register steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EyeCenter {
    /// Left error-onset boundary (inclusive).
    pub left: i32,
    /// Right error-onset boundary (inclusive).
    pub right: i32,
    /// Signed timing step the error-free region is centered on.
    pub center: i32,
}

impl EyeCenter {
    /// Width of the error-free region, in steps.
    pub fn eye_width(&self) -> i32 {
        self.right - self.left + 1
    }
}

/// Estimate the eye center from the zero-voltage row, or `None` when either
/// boundary walk hit an `Invalid` cell first; there is no default fallback.
pub fn estimate_center(dataset: &LaneDataset, caps: &SweepCapabilities) -> Option<EyeCenter> {
    let max = caps.timing_max_steps as i32;
    let right = walk(dataset, (0..=max).collect(), max)?;
    let left = walk(dataset, (0..=max).map(|t| -t).collect(), -max)?;

    let center = EyeCenter {
        left,
        right,
        center: left + (right - left + 1) / 2,
    };
    Some(center)
}

/// Walk the zero-voltage row along `path`. Returns the boundary step, or
/// `None` when an `Invalid` cell stops the walk. `end` is the boundary when
/// the walk completes without seeing an error.
fn walk(dataset: &LaneDataset, path: Vec<i32>, end: i32) -> Option<i32> {
    for timing in path {
        match dataset.get(timing, 0) {
            // A cell synthesized as Invalid, or absent entirely.
            Some(ErrorCount::Invalid) | None => return None,
            Some(ErrorCount::Counted(count)) if count > 0 => {
                // Error onset: boundary is the last error-free step.
                let boundary = if timing == 0 {
                    0
                } else if timing > 0 {
                    timing - 1
                } else {
                    timing + 1
                };
                return Some(boundary);
            }
            Some(ErrorCount::Counted(_)) => {}
        }
    }
    Some(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetBuilder;
    use std::io::Cursor;

    /// Build a single-lane dataset with the zero-voltage row taken from
    /// `row`, indexed -max..=max. `None` leaves the cell to synthesis.
    fn dataset_with_row(max: i32, row: &[Option<u32>]) -> (LaneDataset, SweepCapabilities) {
        assert_eq!(row.len(), (2 * max + 1) as usize);
        let mut report = format!(
            "HS-G5\nTimingMaxSteps {max} TimingMaxOffset {}\nVoltageMaxSteps 1 VoltageMaxOffset 2\n",
            2 * max
        );
        for (i, cell) in row.iter().enumerate() {
            if let Some(count) = cell {
                let timing = i as i32 - max;
                report.push_str(&format!(
                    "lane: 0 timing: {timing} voltage: 0 error count: {count}\n"
                ));
            }
        }
        // Keep the off-row cells present so only voltage 0 drives the walk.
        for t in -max..=max {
            for v in [-1, 1] {
                report.push_str(&format!(
                    "lane: 0 timing: {t} voltage: {v} error count: 0\n"
                ));
            }
        }
        let dataset = DatasetBuilder::new()
            .read_from(Cursor::new(report))
            .unwrap();
        (dataset.lanes[0].clone(), dataset.caps)
    }

    #[test]
    fn boundary_walk_locates_offset_center() {
        // timingMaxSteps=5, all zero except (3,0)=2: right boundary 2,
        // left boundary -5 (walk completes), center -5 + 8/2 = -1.
        let mut row = vec![Some(0u32); 11];
        row[(3 + 5) as usize] = Some(2);
        let (lane, caps) = dataset_with_row(5, &row);

        let estimate = estimate_center(&lane, &caps).unwrap();
        assert_eq!(estimate.right, 2);
        assert_eq!(estimate.left, -5);
        assert_eq!(estimate.eye_width(), 8);
        assert_eq!(estimate.center, -1);
    }

    #[test]
    fn invalid_cell_halts_boundary_walk() {
        // Same row, but (1,0) is missing: the right walk hits Invalid
        // before any failure, so there is no estimate at all.
        let mut row = vec![Some(0u32); 11];
        row[(3 + 5) as usize] = Some(2);
        row[(1 + 5) as usize] = None;
        let (lane, caps) = dataset_with_row(5, &row);

        assert_eq!(estimate_center(&lane, &caps), None);
    }

    #[test]
    fn clean_row_centers_on_zero() {
        let row = vec![Some(0u32); 7];
        let (lane, caps) = dataset_with_row(3, &row);

        let estimate = estimate_center(&lane, &caps).unwrap();
        assert_eq!((estimate.left, estimate.right), (-3, 3));
        assert_eq!(estimate.eye_width(), 7);
        assert_eq!(estimate.center, 0);
    }

    #[test]
    fn error_at_origin_pins_both_boundaries() {
        let mut row = vec![Some(0u32); 7];
        row[3] = Some(9);
        let (lane, caps) = dataset_with_row(3, &row);

        let estimate = estimate_center(&lane, &caps).unwrap();
        assert_eq!((estimate.left, estimate.right), (0, 0));
        assert_eq!(estimate.eye_width(), 1);
        assert_eq!(estimate.center, 0);
    }

    #[test]
    fn symmetric_onsets_center_symmetrically() {
        // Errors at -2 and +2: boundaries -1 and 1, width 3, center 0.
        let mut row = vec![Some(0u32); 11];
        row[(5 - 2) as usize] = Some(1);
        row[(5 + 2) as usize] = Some(1);
        let (lane, caps) = dataset_with_row(5, &row);

        let estimate = estimate_center(&lane, &caps).unwrap();
        assert_eq!((estimate.left, estimate.right), (-1, 1));
        assert_eq!(estimate.center, 0);
    }
}
