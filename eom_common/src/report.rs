//! `.eom` report stream grammar.
//!
//! The acquisition driver appends one line per accepted measurement plus a
//! small header block; the analysis engine reads the stream back. The report
//! is a single-writer-then-single-reader artifact: acquisition closes the
//! file before analysis opens it.
//!
//! Grammar (one record per line):
//!
//! ```text
//! UFS <Host|Device> Side Eye Monitor Start
//! - - - - UFS INQUIRY ID: <manufacturer> <product> <revision>
//! - - - - UFS Link Speed: HS-G<digit>
//! EOM Capabilities:
//! TimingMaxSteps <int> TimingMaxOffset <int>
//! VoltageMaxSteps <int> VoltageMaxOffset <int>
//! lane: <int> timing: <signed-int> voltage: <signed-int> error count: <int>
//! ```
//!
//! Numbers may carry a leading minus and thousands-separator commas; only
//! the digits before the first comma are significant and the sign applies to
//! the whole value.

use crate::types::{ErrorCount, ScanPoint, Side, SweepCapabilities};
use std::io::{self, Write};
use std::time::Duration;

/// One classified report line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    /// `UFS <side> Side Eye Monitor Start`; carries the side name token.
    SideStart(String),
    /// `TimingMaxSteps <n> TimingMaxOffset <n>`.
    TimingCaps { max_steps: u32, max_offset: i32 },
    /// `VoltageMaxSteps <n> VoltageMaxOffset <n>`.
    VoltageCaps { max_steps: u32, max_offset: i32 },
    /// Free-text device identification line carrying an `HS-G<digit>` token.
    GearToken(u8),
    /// One accepted measurement. Lane is kept wide here; range checking
    /// belongs to the dataset builder.
    Measurement {
        lane: i64,
        timing: i32,
        voltage: i32,
        error_count: ErrorCount,
    },
    /// A line matching a structured layout whose numeric decode failed.
    BadLine,
    /// Anything else (blank lines, banners, trailers).
    Other,
}

/// Decode a report number: optional leading minus, digits up to the first
/// thousands-separator comma. `"-12,345"` decodes to `-12`.
pub fn string_to_number(s: &str) -> Option<i64> {
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let digits = rest.split(',').next()?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Classify one report line.
pub fn parse_line(line: &str) -> ReportLine {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    if is_measurement_layout(&tokens) {
        return parse_measurement(&tokens);
    }

    if line.contains("TimingMaxSteps") && line.contains("TimingMaxOffset") {
        return parse_caps(&tokens, "TimingMaxSteps", "TimingMaxOffset", true);
    }
    if line.contains("VoltageMaxSteps") && line.contains("VoltageMaxOffset") {
        return parse_caps(&tokens, "VoltageMaxSteps", "VoltageMaxOffset", false);
    }

    if line.contains("Side Eye Monitor Start")
        && tokens.len() >= 6
        && tokens[0] == "UFS"
        && tokens[2] == "Side"
        && tokens[3] == "Eye"
        && tokens[4] == "Monitor"
        && tokens[5] == "Start"
    {
        return ReportLine::SideStart(tokens[1].to_string());
    }

    if let Some(gear) = extract_gear_token(line) {
        return ReportLine::GearToken(gear);
    }

    ReportLine::Other
}

/// Extract the numeric gear from an `HS-G<digit>` token anywhere in a line.
pub fn extract_gear_token(line: &str) -> Option<u8> {
    let pos = line.find("HS-G")?;
    let digit = line[pos + 4..].chars().next()?;
    digit.to_digit(10).map(|d| d as u8)
}

fn is_measurement_layout(tokens: &[&str]) -> bool {
    tokens.len() == 9
        && tokens[0] == "lane:"
        && tokens[2] == "timing:"
        && tokens[4] == "voltage:"
        && tokens[6] == "error"
        && tokens[7] == "count:"
}

fn parse_measurement(tokens: &[&str]) -> ReportLine {
    let lane = string_to_number(tokens[1]);
    let timing = string_to_number(tokens[3]);
    let voltage = string_to_number(tokens[5]);
    let count = string_to_number(tokens[8]);

    match (lane, timing, voltage, count) {
        (Some(lane), Some(timing), Some(voltage), Some(count)) if count >= 0 => {
            ReportLine::Measurement {
                lane,
                timing: timing as i32,
                voltage: voltage as i32,
                error_count: ErrorCount::from_raw(count as u32),
            }
        }
        _ => ReportLine::BadLine,
    }
}

fn parse_caps(tokens: &[&str], steps_key: &str, offset_key: &str, timing: bool) -> ReportLine {
    if tokens.len() < 4 || tokens[0] != steps_key || tokens[2] != offset_key {
        return ReportLine::BadLine;
    }
    let steps = string_to_number(tokens[1]);
    let offset = string_to_number(tokens[3]);
    match (steps, offset) {
        (Some(steps), Some(offset)) if steps >= 0 => {
            let max_steps = steps as u32;
            let max_offset = offset as i32;
            if timing {
                ReportLine::TimingCaps {
                    max_steps,
                    max_offset,
                }
            } else {
                ReportLine::VoltageCaps {
                    max_steps,
                    max_offset,
                }
            }
        }
        _ => ReportLine::BadLine,
    }
}

/// Append-only report sink wrapping any `Write` destination.
///
/// Writes the header block once, then one measurement line per accepted
/// scan point, then the completion trailer.
pub struct ReportWriter<W: Write> {
    out: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Emit the run header: side line, optional device identification,
    /// link speed and the capability block.
    pub fn write_header(
        &mut self,
        side: Side,
        inquiry_id: Option<&str>,
        gear: u8,
        caps: &SweepCapabilities,
    ) -> io::Result<()> {
        writeln!(self.out, "UFS {} Side Eye Monitor Start", side.report_name())?;
        if let Some(id) = inquiry_id {
            writeln!(self.out, "- - - - UFS INQUIRY ID: {id}")?;
        }
        writeln!(self.out, "- - - - UFS Link Speed: HS-G{gear}")?;
        writeln!(self.out, "EOM Capabilities:")?;
        writeln!(
            self.out,
            "TimingMaxSteps {} TimingMaxOffset {}",
            caps.timing_max_steps, caps.timing_max_offset
        )?;
        writeln!(
            self.out,
            "VoltageMaxSteps {} VoltageMaxOffset {}",
            caps.voltage_max_steps, caps.voltage_max_offset
        )?;
        Ok(())
    }

    /// Append one accepted measurement.
    pub fn record(&mut self, point: &ScanPoint) -> io::Result<()> {
        writeln!(
            self.out,
            "lane: {} timing: {} voltage: {} error count: {}",
            point.lane,
            point.timing,
            point.voltage,
            point.error_count.to_raw()
        )
    }

    /// Append the completion trailer with the elapsed wall-clock time.
    pub fn finish(&mut self, elapsed: Duration) -> io::Result<()> {
        writeln!(
            self.out,
            "EOM Scan Finished!\nTime elapsed: {:.1} seconds",
            elapsed.as_secs_f64()
        )?;
        self.out.flush()
    }
}
