//! Vendor-CLI transport adapter.
//!
//! Registers are reached through the vendor `lsufs` CLI running on the
//! target, invoked over `adb shell`. This module is deliberately thin: it
//! formats command lines, runs them and scrapes the values back out of the
//! tool's stdout. Everything protocol-shaped lives behind
//! [`RegisterAccess`] instead.

use crate::register::RegisterAccess;
use crate::traffic::TrafficSource;
use eom_common::types::{Direction, Side};
use std::process::Command;
use tracing::{debug, warn};

/// Scratch file on the target used for link exercise bursts. `/data` sits
/// on the UFS device itself, so moving this file moves data over the link
/// under test.
const TRAFFIC_FILE: &str = "/data/local/tmp/eom_traffic.bin";

/// Burst size in 64 KiB blocks (4 MiB, matching the vendor tool).
const TRAFFIC_BLOCKS: u32 = 64;

/// `lsufs` invocations for one UFS BSG device node.
pub struct LsufsCli {
    lsufs_path: String,
    device_path: String,
    side: Side,
}

impl LsufsCli {
    pub fn new(lsufs_path: &str, device_path: &str, side: Side) -> Self {
        Self {
            lsufs_path: lsufs_path.to_string(),
            device_path: device_path.to_string(),
            side,
        }
    }

    /// Check that a path exists on the target (`adb shell ls <path>`).
    pub fn probe_path(path: &str) -> bool {
        Command::new("adb")
            .args(["shell", "ls", path])
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Run one `adb shell` command line, returning stdout on success.
    fn shell(&self, args: &[String]) -> Option<String> {
        let output = Command::new("adb")
            .arg("shell")
            .args(args)
            .output()
            .map_err(|e| warn!("adb invocation failed: {e}"))
            .ok()?;
        if !output.status.success() {
            debug!("lsufs exited with {:?}: {:?}", output.status, args);
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn uic_args(&self, lane: Option<u8>, index: u16, direction: Direction, side: Side) -> Vec<String> {
        let mut args = vec![self.lsufs_path.clone(), "uic".to_string()];
        args.push(format!("--{side}"));
        if let Some(lane) = lane {
            args.push("--lane".to_string());
            args.push(lane.to_string());
        }
        args.push("-i".to_string());
        args.push(format!("{index:#x}"));
        args.push(format!("--{direction}"));
        args.push("-d".to_string());
        args.push(self.device_path.clone());
        args
    }

    /// Best-effort INQUIRY identification string
    /// (`<manufacturer> <product> <revision>`), from the device descriptor
    /// and the three string descriptors it points at.
    pub fn inquiry_id(&self) -> Option<String> {
        let device_desc = self.query_desc(0, 0)?;
        let mname_idx = desc_byte(&device_desc, 0x14)?;
        let pname_idx = desc_byte(&device_desc, 0x15)?;
        let pver_idx = desc_byte(&device_desc, 0x2a)?;

        let mname = parse_string_desc(&self.query_desc(5, mname_idx)?, 8);
        let pname = parse_string_desc(&self.query_desc(5, pname_idx)?, 16);
        let pver = parse_string_desc(&self.query_desc(5, pver_idx)?, 4);
        Some(format!("{mname} {pname} {pver}"))
    }

    /// Seed the traffic scratch file with random data so link exercise
    /// bursts do not move a compressible all-zero pattern.
    pub fn prepare_traffic_file(&self) -> bool {
        let args = vec![
            "dd".to_string(),
            "if=/dev/urandom".to_string(),
            format!("of={TRAFFIC_FILE}"),
            "bs=65536".to_string(),
            format!("count={TRAFFIC_BLOCKS}"),
            "conv=fsync".to_string(),
        ];
        self.shell(&args).is_some()
    }

    /// `lsufs query -o 1 -i <idn> -I <index> -s 0 -d <device>`.
    fn query_desc(&self, idn: u8, index: u8) -> Option<String> {
        let args = vec![
            self.lsufs_path.clone(),
            "query".to_string(),
            "-o".to_string(),
            "1".to_string(),
            "-i".to_string(),
            idn.to_string(),
            "-I".to_string(),
            index.to_string(),
            "-s".to_string(),
            "0".to_string(),
            "-d".to_string(),
            self.device_path.clone(),
        ];
        self.shell(&args)
    }
}

impl RegisterAccess for LsufsCli {
    fn read(&self, lane: Option<u8>, index: u16, direction: Direction) -> Option<u32> {
        let mut args = self.uic_args(lane, index, direction, self.side);
        args.insert(2, "-g".to_string());
        let output = self.shell(&args)?;
        let value = parse_uic_value(&output);
        if value.is_none() {
            warn!("no value in lsufs output for attribute {index:#06x}");
        }
        value
    }

    fn write(&self, lane: Option<u8>, index: u16, value: u32, direction: Direction, side: Side) {
        let mut args = self.uic_args(lane, index, direction, side);
        args.insert(2, "-s".to_string());
        args.insert(3, format!("{value:#x}"));
        if self.shell(&args).is_none() {
            // The vendor CLI gives no usable write status; a genuinely lost
            // write surfaces as a read failure on the next poll.
            warn!("uic write to attribute {index:#06x} reported failure");
        }
    }
}

impl TrafficSource for LsufsCli {
    fn exercise(&self) -> bool {
        // Writing the scratch file exercises the device Rx; reading it
        // exercises the host Rx. `direct` keeps the page cache from
        // swallowing the transfer.
        let args: Vec<String> = match self.side {
            Side::Peer => vec![
                "dd".to_string(),
                "if=/dev/urandom".to_string(),
                format!("of={TRAFFIC_FILE}"),
                "bs=65536".to_string(),
                format!("count={TRAFFIC_BLOCKS}"),
                "oflag=direct".to_string(),
            ],
            Side::Local => vec![
                "dd".to_string(),
                format!("if={TRAFFIC_FILE}"),
                "of=/dev/null".to_string(),
                "bs=65536".to_string(),
                "iflag=direct".to_string(),
            ],
        };
        self.shell(&args).is_some()
    }
}

/// Extract the hex value from a ` = 0x<hex>` token in lsufs output.
fn parse_uic_value(output: &str) -> Option<u32> {
    let pos = output.find(" = 0x")?;
    let hex: String = output[pos + 5..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    u32::from_str_radix(&hex, 16).ok()
}

/// Extract one descriptor byte from a `Offset 0x<off> : 0x<val>` line.
fn desc_byte(output: &str, offset: u8) -> Option<u8> {
    let needle = format!("Offset {offset:#x} : 0x");
    let pos = output.find(&needle)?;
    let hex: String = output[pos + needle.len()..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    u8::from_str_radix(&hex, 16).ok()
}

/// Decode a UFS string descriptor dump: UTF-16 code units start at byte
/// offset 3 and every other byte carries the ASCII payload.
fn parse_string_desc(output: &str, length: usize) -> String {
    let mut result = String::new();
    for i in 0..length {
        let offset = (2 * i + 3) as u8;
        if let Some(byte) = desc_byte(output, offset) {
            if byte != 0 {
                result.push(byte as char);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uic_value_parses_from_tool_output() {
        assert_eq!(parse_uic_value("0x00f2{RX} = 0x10\n"), Some(0x10));
        assert_eq!(parse_uic_value("RX_EYEMON_Start = 0x0"), Some(0));
        assert_eq!(parse_uic_value("error: no device"), None);
        assert_eq!(parse_uic_value(" = 0x"), None);
    }

    #[test]
    fn descriptor_bytes_parse_from_dump() {
        let dump = "Offset 0x14 : 0x12\nOffset 0x15 : 0x13\nOffset 0x2a : 0x2\n";
        assert_eq!(desc_byte(dump, 0x14), Some(0x12));
        assert_eq!(desc_byte(dump, 0x15), Some(0x13));
        assert_eq!(desc_byte(dump, 0x2a), Some(0x02));
        assert_eq!(desc_byte(dump, 0x30), None);
    }

    #[test]
    fn string_descriptor_decodes_ascii_payload() {
        // "AB" encoded at offsets 3 and 5, terminator at 7.
        let dump = "Offset 0x3 : 0x41\nOffset 0x5 : 0x42\nOffset 0x7 : 0x0\n";
        assert_eq!(parse_string_desc(dump, 3), "AB");
    }
}
