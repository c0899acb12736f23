//! Report parsing and rectangular grid synthesis.
//!
//! `DatasetBuilder` consumes a `.eom` report stream and produces one
//! complete grid per lane present: every `(timing, voltage)` key of the
//! full cross product is present afterwards, either as a parsed
//! measurement or as the `Invalid` sentinel. All-or-nothing: any bad data
//! line or broken header aborts the whole analysis.

use crate::error::AnalyzeError;
use eom_common::consts::{EOM_LANE_COUNT, EOM_TARGET_TEST_COUNT_DEFAULT};
use eom_common::report::{ReportLine, parse_line};
use eom_common::types::{ErrorCount, Gear, SweepCapabilities};
use std::collections::BTreeMap;
use std::io::BufRead;
use tracing::{debug, warn};

/// Complete grid of one lane. Cell count always equals
/// [`SweepCapabilities::grid_len`] once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneDataset {
    pub lane: u8,
    cells: BTreeMap<(i32, i32), ErrorCount>,
    /// Cells missing within the observed span, before synthesis filled
    /// them. Diagnostic only.
    pub observed_holes: usize,
}

impl LaneDataset {
    /// Error count at a grid cell. Cells outside the grid read as absent.
    pub fn get(&self, timing: i32, voltage: i32) -> Option<ErrorCount> {
        self.cells.get(&(timing, voltage)).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All grid cells in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&(i32, i32), &ErrorCount)> {
        self.cells.iter()
    }
}

/// Everything the analysis needs from one report stream.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub caps: SweepCapabilities,
    pub gear: Gear,
    /// Side name from the report header (`Host` / `Device`), if present.
    pub side: Option<String>,
    /// Lanes present in the report, in lane order.
    pub lanes: Vec<LaneDataset>,
}

/// Parse a report stream into complete per-lane grids.
pub struct DatasetBuilder {
    observed: [BTreeMap<(i32, i32), ErrorCount>; EOM_LANE_COUNT as usize],
    lane_present: [bool; EOM_LANE_COUNT as usize],
    timing_caps: Option<(u32, i32)>,
    voltage_caps: Option<(u32, i32)>,
    gear: Option<u8>,
    side: Option<String>,
    bad_lines: usize,
    line_no: usize,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self {
            observed: [BTreeMap::new(), BTreeMap::new()],
            lane_present: [false, false],
            timing_caps: None,
            voltage_caps: None,
            gear: None,
            side: None,
            bad_lines: 0,
            line_no: 0,
        }
    }

    /// Consume one report line.
    pub fn push_line(&mut self, line: &str) -> Result<(), AnalyzeError> {
        self.line_no += 1;
        match parse_line(line) {
            ReportLine::Measurement {
                lane,
                timing,
                voltage,
                error_count,
            } => {
                if lane < 0 || lane >= EOM_LANE_COUNT as i64 {
                    return Err(AnalyzeError::BadLane {
                        lane,
                        line: self.line_no,
                    });
                }
                let lane = lane as usize;
                self.lane_present[lane] = true;
                self.observed[lane].insert((timing, voltage), error_count);
            }
            ReportLine::BadLine => {
                warn!(line = self.line_no, "bad data line: {line}");
                self.bad_lines += 1;
            }
            ReportLine::TimingCaps {
                max_steps,
                max_offset,
            } => self.timing_caps = Some((max_steps, max_offset)),
            ReportLine::VoltageCaps {
                max_steps,
                max_offset,
            } => self.voltage_caps = Some((max_steps, max_offset)),
            ReportLine::GearToken(gear) => {
                if self.gear.is_none() {
                    self.gear = Some(gear);
                }
            }
            ReportLine::SideStart(side) => self.side = Some(side),
            ReportLine::Other => {}
        }
        Ok(())
    }

    /// Consume a whole report stream.
    pub fn read_from<R: BufRead>(mut self, reader: R) -> Result<Dataset, AnalyzeError> {
        for line in reader.lines() {
            self.push_line(&line?)?;
        }
        self.finish()
    }

    /// Validate headers and synthesize the full grids.
    pub fn finish(self) -> Result<Dataset, AnalyzeError> {
        if self.bad_lines > 0 {
            return Err(AnalyzeError::BadLines(self.bad_lines));
        }

        let (timing_max_steps, timing_max_offset) =
            self.timing_caps.ok_or(AnalyzeError::MissingCapabilities)?;
        let (voltage_max_steps, voltage_max_offset) =
            self.voltage_caps.ok_or(AnalyzeError::MissingCapabilities)?;

        let caps = SweepCapabilities {
            timing_max_steps,
            timing_max_offset,
            voltage_max_steps,
            voltage_max_offset,
            // The report does not carry the target test count; it plays no
            // part in analysis.
            target_test_count: EOM_TARGET_TEST_COUNT_DEFAULT,
        };
        caps.validate()?;

        let raw_gear = self.gear.ok_or(AnalyzeError::MissingGear)?;
        let gear = Gear::new(raw_gear).ok_or(AnalyzeError::UnsupportedGear(raw_gear))?;

        let mut lanes = Vec::new();
        for (lane, observed) in self.observed.into_iter().enumerate() {
            if !self.lane_present[lane] {
                continue;
            }
            lanes.push(synthesize_lane(lane as u8, observed, &caps));
        }

        Ok(Dataset {
            caps,
            gear,
            side: self.side,
            lanes,
        })
    }
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fill the full cross-product grid, assigning `Invalid` to every cell the
/// report omitted, and count holes inside the observed span for
/// diagnostics.
fn synthesize_lane(
    lane: u8,
    observed: BTreeMap<(i32, i32), ErrorCount>,
    caps: &SweepCapabilities,
) -> LaneDataset {
    // Holes within the span the sweep actually visited usually mean a
    // truncated or clobbered report; worth flagging, never fatal here
    // because synthesis fills them anyway.
    let observed_holes = count_span_holes(lane, &observed);

    let mut cells = observed;
    for timing in caps.timing_range() {
        for voltage in caps.voltage_range() {
            cells.entry((timing, voltage)).or_insert(ErrorCount::Invalid);
        }
    }

    LaneDataset {
        lane,
        cells,
        observed_holes,
    }
}

fn count_span_holes(lane: u8, observed: &BTreeMap<(i32, i32), ErrorCount>) -> usize {
    if observed.is_empty() {
        return 0;
    }
    let timings: Vec<i32> = observed.keys().map(|(t, _)| *t).collect();
    let voltages: Vec<i32> = observed.keys().map(|(_, v)| *v).collect();
    let (t_min, t_max) = (*timings.iter().min().unwrap(), *timings.iter().max().unwrap());
    let (v_min, v_max) = (*voltages.iter().min().unwrap(), *voltages.iter().max().unwrap());

    let mut holes = 0;
    for timing in t_min..=t_max {
        for voltage in v_min..=v_max {
            if !observed.contains_key(&(timing, voltage)) {
                debug!(lane, timing, voltage, "report is missing data");
                holes += 1;
            }
        }
    }
    if holes > 0 {
        warn!(lane, holes, "report has holes inside the observed span");
    }
    holes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(timing: (u32, i32), voltage: (u32, i32)) -> String {
        format!(
            "UFS Host Side Eye Monitor Start\n\
             - - - - UFS Link Speed: HS-G5\n\
             EOM Capabilities:\n\
             TimingMaxSteps {} TimingMaxOffset {}\n\
             VoltageMaxSteps {} VoltageMaxOffset {}\n",
            timing.0, timing.1, voltage.0, voltage.1
        )
    }

    fn full_report(timing_max: i32, voltage_max: i32) -> String {
        let mut report = header((timing_max as u32, 2 * timing_max), (voltage_max as u32, 16));
        for t in -timing_max..=timing_max {
            for v in -voltage_max..=voltage_max {
                report.push_str(&format!(
                    "lane: 0 timing: {t} voltage: {v} error count: 0\n"
                ));
            }
        }
        report
    }

    fn build(report: &str) -> Result<Dataset, AnalyzeError> {
        DatasetBuilder::new().read_from(Cursor::new(report))
    }

    #[test]
    fn complete_report_builds_exact_grid() {
        let dataset = build(&full_report(3, 2)).unwrap();
        assert_eq!(dataset.lanes.len(), 1);
        let lane = &dataset.lanes[0];
        assert_eq!(lane.len(), dataset.caps.grid_len());
        assert_eq!(lane.len(), 7 * 5);
        assert_eq!(lane.observed_holes, 0);
        assert_eq!(lane.get(3, -2), Some(ErrorCount::Counted(0)));
        assert_eq!(dataset.side.as_deref(), Some("Host"));
        assert_eq!(dataset.gear.number(), 5);
    }

    #[test]
    fn omitted_cells_become_invalid_sentinels() {
        let mut report = header((2, 4), (1, 2));
        report.push_str("lane: 1 timing: 0 voltage: 0 error count: 4\n");
        let dataset = build(&report).unwrap();

        let lane = &dataset.lanes[0];
        assert_eq!(lane.lane, 1);
        assert_eq!(lane.len(), 5 * 3);
        assert_eq!(lane.get(0, 0), Some(ErrorCount::Counted(4)));
        assert_eq!(lane.get(2, 1), Some(ErrorCount::Invalid));
        assert_eq!(lane.get(-2, -1), Some(ErrorCount::Invalid));
    }

    #[test]
    fn span_holes_are_diagnostic_not_fatal() {
        let mut report = header((2, 4), (1, 2));
        // Corners of a 3x3 observed span, center missing.
        for (t, v) in [(-1, -1), (-1, 1), (1, -1), (1, 1)] {
            report.push_str(&format!(
                "lane: 0 timing: {t} voltage: {v} error count: 0\n"
            ));
        }
        let dataset = build(&report).unwrap();
        let lane = &dataset.lanes[0];
        // 3x3 span minus the 4 observed corners.
        assert_eq!(lane.observed_holes, 5);
        assert_eq!(lane.len(), dataset.caps.grid_len());
    }

    #[test]
    fn bad_lines_are_counted_then_fatal() {
        let mut report = full_report(1, 1);
        report.push_str("lane: 0 timing: oops voltage: 0 error count: 1\n");
        report.push_str("lane: 0 timing: 0 voltage: bad error count: 1\n");
        match build(&report) {
            Err(AnalyzeError::BadLines(2)) => {}
            other => panic!("expected BadLines(2), got {other:?}"),
        }
    }

    #[test]
    fn missing_headers_are_fatal() {
        assert!(matches!(
            build("lane: 0 timing: 0 voltage: 0 error count: 0\n"),
            Err(AnalyzeError::MissingCapabilities)
        ));

        let report = "TimingMaxSteps 2 TimingMaxOffset 4\n\
                      VoltageMaxSteps 1 VoltageMaxOffset 2\n";
        assert!(matches!(build(report), Err(AnalyzeError::MissingGear)));
    }

    #[test]
    fn zero_step_size_is_fatal() {
        let report = header((0, 4), (1, 2));
        assert!(matches!(build(&report), Err(AnalyzeError::Capability(_))));
    }

    #[test]
    fn low_gear_is_fatal() {
        let report = full_report(1, 1).replace("HS-G5", "HS-G3");
        assert!(matches!(build(&report), Err(AnalyzeError::UnsupportedGear(3))));
    }

    #[test]
    fn wrong_lane_number_is_fatal() {
        let mut report = header((1, 2), (1, 2));
        report.push_str("lane: 7 timing: 0 voltage: 0 error count: 0\n");
        assert!(matches!(
            build(&report),
            Err(AnalyzeError::BadLane { lane: 7, .. })
        ));
    }

    #[test]
    fn builder_is_idempotent() {
        let report = full_report(2, 2);
        let a = build(&report).unwrap();
        let b = build(&report).unwrap();
        assert_eq!(a.lanes, b.lanes);
        assert_eq!(a.caps, b.caps);
    }

    #[test]
    fn missing_gear_line_without_measurements_is_fatal() {
        let report = "TimingMaxSteps 1 TimingMaxOffset 2\n\
                      VoltageMaxSteps 1 VoltageMaxOffset 2\n\
                      lane: 0 timing: 0 voltage: 0 error count: 0\n";
        assert!(matches!(build(report), Err(AnalyzeError::MissingGear)));
    }
}
