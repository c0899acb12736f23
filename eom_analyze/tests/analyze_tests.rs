//! End-to-end analysis over a report file on disk, written with the same
//! writer the acquisition side uses.

use eom_analyze::dataset::DatasetBuilder;
use eom_analyze::mask::evaluate;
use eom_common::report::ReportWriter;
use eom_common::types::{ErrorCount, ScanPoint, Side, SweepCapabilities};
use std::fs::File;
use std::io::{BufReader, Write};
use std::time::Duration;

fn caps() -> SweepCapabilities {
    // 0.02 UI per timing step, 20 mV per voltage step.
    SweepCapabilities {
        timing_max_steps: 16,
        timing_max_offset: 32,
        voltage_max_steps: 8,
        voltage_max_offset: 16,
        target_test_count: 0x5D,
    }
}

/// Error count injected for one lane at one grid cell.
type Fault = (u8, i32, i32, u32);

fn write_report(path: &std::path::Path, lanes: &[u8], faults: &[Fault]) {
    let caps = caps();
    let mut writer = ReportWriter::new(File::create(path).unwrap());
    writer
        .write_header(Side::Local, Some("ACME UFS256 0100"), 5, &caps)
        .unwrap();
    for &lane in lanes {
        for timing in caps.timing_range() {
            for voltage in caps.voltage_range() {
                let count = faults
                    .iter()
                    .find(|(l, t, v, _)| *l == lane && *t == timing && *v == voltage)
                    .map(|(_, _, _, c)| *c)
                    .unwrap_or(0);
                writer
                    .record(&ScanPoint {
                        lane,
                        timing,
                        voltage,
                        error_count: ErrorCount::from_raw(count),
                    })
                    .unwrap();
            }
        }
    }
    writer.finish(Duration::from_secs_f64(1234.5)).unwrap();
}

fn analyze(path: &std::path::Path) -> eom_analyze::mask::RunVerdict {
    let dataset = DatasetBuilder::new()
        .read_from(BufReader::new(File::open(path).unwrap()))
        .unwrap();
    evaluate(&dataset)
}

#[test]
fn two_lane_report_fails_on_the_dirty_lane() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_lane_0_1_ttc_93.eom");

    // Lane 0: errors only at the sweep extremes, outside any mask.
    // Lane 1: a handful of errors right at the eye center.
    write_report(
        &path,
        &[0, 1],
        &[(0, 16, 0, 61), (0, -16, 0, 61), (1, 0, 0, 5)],
    );

    let verdict = analyze(&path);
    assert_eq!(verdict.lanes.len(), 2);

    let lane0 = &verdict.lanes[0];
    assert_eq!(lane0.lane, 0);
    assert!(lane0.passed());
    // Error onsets at +/-16 leave boundaries at +/-15, center 0.
    let center = lane0.center.unwrap();
    assert_eq!((center.left, center.right, center.center), (-15, 15, 0));

    let lane1 = &verdict.lanes[1];
    assert_eq!(lane1.lane, 1);
    assert!(lane1.failed);
    assert!(!lane1.indeterminate);
    assert_eq!(lane1.label(), "FAIL");

    assert_eq!(verdict.label(), "FAIL");
    assert!(!verdict.passed());
}

#[test]
fn clean_two_lane_report_passes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clean.eom");
    write_report(&path, &[0, 1], &[]);

    let verdict = analyze(&path);
    assert!(verdict.passed());
    assert_eq!(verdict.label(), "PASS");
    assert!(verdict.lanes.iter().all(|l| l.label() == "PASS"));
}

#[test]
fn truncated_report_turns_the_missing_region_indeterminate() {
    // Hand-build a report the sweep abandoned partway: only the negative
    // timing half of lane 0 made it to disk.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.eom");
    let caps = caps();
    let mut writer = ReportWriter::new(File::create(&path).unwrap());
    writer.write_header(Side::Peer, None, 5, &caps).unwrap();
    for timing in -16..0 {
        for voltage in caps.voltage_range() {
            writer
                .record(&ScanPoint {
                    lane: 0,
                    timing,
                    voltage,
                    error_count: ErrorCount::Counted(0),
                })
                .unwrap();
        }
    }
    drop(writer);

    let verdict = analyze(&path);
    let lane = &verdict.lanes[0];
    // (0, 0) was never measured, so the right boundary walk is poisoned
    // and mask evaluation is skipped outright.
    assert!(lane.center.is_none());
    assert!(lane.center_ui.is_none());
    assert!(lane.indeterminate);
    assert!(!lane.failed);
    assert_eq!(lane.failing_points, 0);
    assert_eq!(verdict.label(), "INDETERMINATE");
}

#[test]
fn report_with_a_corrupt_line_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.eom");
    write_report(&path, &[0], &[]);

    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "lane: 0 timing: garbage voltage: 0 error count: 1").unwrap();
    drop(file);

    let result = DatasetBuilder::new()
        .read_from(BufReader::new(File::open(&path).unwrap()));
    assert!(matches!(
        result,
        Err(eom_analyze::AnalyzeError::BadLines(1))
    ));
}
