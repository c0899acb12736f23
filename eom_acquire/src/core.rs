//! Whole-run acquisition orchestration.
//!
//! `EomAcquisition` owns the register transport and drives a full run:
//! capability probe, sweep envelope read, gear check, report header, then
//! one sequential [`SweepDriver`] pass per lane. Lanes share the local and
//! peer UIC register space, so they are never scanned concurrently.

use crate::error::AcquireError;
use crate::register::RegisterAccess;
use crate::sweep::{PollPolicy, SweepDriver};
use crate::traffic::TrafficSource;
use eom_common::consts::{
    EOM_LANE_COUNT, PA_RXGEAR, RX_EYEMON_CAPABILITY, RX_EYEMON_TIMING_MAX_OFFSET_CAPABILITY,
    RX_EYEMON_TIMING_MAX_STEPS_CAPABILITY, RX_EYEMON_VOLTAGE_MAX_OFFSET_CAPABILITY,
    RX_EYEMON_VOLTAGE_MAX_STEPS_CAPABILITY,
};
use eom_common::report::ReportWriter;
use eom_common::types::{Direction, Gear, Side, SweepCapabilities};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};
use tracing::info;

/// What to sweep, as requested on the command line.
#[derive(Debug, Clone, Copy)]
pub struct SweepPlan {
    /// Requested lane; `None` sweeps all connected lanes.
    pub lane: Option<u8>,
    /// Single-voltage run; `None` sweeps all voltages.
    pub voltage: Option<i32>,
    /// RX_EYEMON_Target_Test_Count for every point.
    pub target_test_count: u8,
    /// Fire a link traffic burst on every poll iteration so the receiver
    /// under test sees live data while the monitor counts.
    pub exercise_io: bool,
}

impl SweepPlan {
    /// Lanes to sweep, in order.
    pub fn lanes(&self) -> Vec<u8> {
        match self.lane {
            Some(lane) => vec![lane],
            None => (0..EOM_LANE_COUNT).collect(),
        }
    }

    /// Lane part of the report file name (`0`, `1` or `0_1`).
    pub fn lane_label(&self) -> String {
        match self.lane {
            Some(lane) => lane.to_string(),
            None => "0_1".to_string(),
        }
    }
}

/// Counters of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunStats {
    /// Accepted scan points across all lanes.
    pub points: u64,
    /// Wall-clock duration of the sweep.
    pub elapsed: Duration,
}

/// One acquisition run over a [`RegisterAccess`] transport.
pub struct EomAcquisition<R: RegisterAccess> {
    regs: R,
    side: Side,
    policy: PollPolicy,
    running: Arc<AtomicBool>,
}

impl<R: RegisterAccess> EomAcquisition<R> {
    pub fn new(regs: R, side: Side) -> Self {
        Self {
            regs,
            side,
            policy: PollPolicy::default(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Flag observed between scan points; clearing it aborts the run with
    /// the EOM control register still disabled.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    fn read_rx(&self, lane: u8, attr: u16) -> Result<u32, AcquireError> {
        self.regs
            .read(Some(lane), attr, Direction::Rx)
            .ok_or(AcquireError::Transport {
                attr,
                lane: Some(lane),
            })
    }

    /// RX_EYEMON_Capability probe: bit 0 clear means no monitor.
    fn check_supported(&self, lane: u8) -> Result<(), AcquireError> {
        let cap = self.read_rx(lane, RX_EYEMON_CAPABILITY)?;
        if cap & 0x1 == 0 {
            return Err(AcquireError::NotSupported);
        }
        Ok(())
    }

    /// Read the sweep envelope once; immutable for the rest of the run.
    fn read_capabilities(
        &self,
        lane: u8,
        target_test_count: u8,
    ) -> Result<SweepCapabilities, AcquireError> {
        let caps = SweepCapabilities {
            timing_max_steps: self.read_rx(lane, RX_EYEMON_TIMING_MAX_STEPS_CAPABILITY)?,
            timing_max_offset: self.read_rx(lane, RX_EYEMON_TIMING_MAX_OFFSET_CAPABILITY)? as i32,
            voltage_max_steps: self.read_rx(lane, RX_EYEMON_VOLTAGE_MAX_STEPS_CAPABILITY)?,
            voltage_max_offset: self.read_rx(lane, RX_EYEMON_VOLTAGE_MAX_OFFSET_CAPABILITY)?
                as i32,
            target_test_count,
        };
        caps.validate()?;
        Ok(caps)
    }

    /// Current link gear; gears below 4 have no validated mask and abort
    /// the run outright.
    fn read_gear(&self) -> Result<Gear, AcquireError> {
        let raw = self
            .regs
            .read(None, PA_RXGEAR, Direction::Tx)
            .ok_or(AcquireError::Transport {
                attr: PA_RXGEAR,
                lane: None,
            })?;
        Gear::new(raw as u8).ok_or(AcquireError::UnsupportedGear(raw as u8))
    }

    /// Execute the full run, appending header, measurements and trailer to
    /// `sink`. The transport doubles as the traffic source when the plan
    /// asks for link exercise.
    pub fn run<W: Write>(
        &self,
        plan: &SweepPlan,
        inquiry_id: Option<&str>,
        sink: W,
    ) -> Result<RunStats, AcquireError>
    where
        R: TrafficSource,
    {
        let lanes = plan.lanes();
        let first_lane = lanes[0];

        self.check_supported(first_lane)?;
        let caps = self.read_capabilities(first_lane, plan.target_test_count)?;
        let gear = self.read_gear()?;

        if let Some(voltage) = plan.voltage {
            if voltage.unsigned_abs() > caps.voltage_max_steps {
                return Err(AcquireError::InvalidVoltage {
                    voltage,
                    max: caps.voltage_max_steps,
                });
            }
        }

        info!(
            side = %self.side,
            %gear,
            timing_max_steps = caps.timing_max_steps,
            voltage_max_steps = caps.voltage_max_steps,
            "starting EOM scan"
        );

        let mut writer = ReportWriter::new(sink);
        writer.write_header(self.side, inquiry_id, gear.number(), &caps)?;

        let traffic = plan
            .exercise_io
            .then_some(&self.regs as &dyn TrafficSource);
        let driver = SweepDriver::new(
            &self.regs,
            self.side,
            caps,
            self.policy,
            self.running.clone(),
            traffic,
        );

        let start = Instant::now();
        let mut points = 0u64;
        for lane in lanes {
            info!(lane, "sweeping lane");
            points += driver.sweep_lane(lane, plan.voltage, &mut writer)?;
        }
        let elapsed = start.elapsed();

        writer.finish(elapsed)?;
        info!(points, elapsed_s = elapsed.as_secs_f64(), "EOM scan finished");
        Ok(RunStats { points, elapsed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_lane_selection() {
        let all = SweepPlan {
            lane: None,
            voltage: None,
            target_test_count: 0x5D,
            exercise_io: false,
        };
        assert_eq!(all.lanes(), vec![0, 1]);
        assert_eq!(all.lane_label(), "0_1");

        let one = SweepPlan {
            lane: Some(1),
            voltage: None,
            target_test_count: 0x5D,
            exercise_io: false,
        };
        assert_eq!(one.lanes(), vec![1]);
        assert_eq!(one.lane_label(), "1");
    }
}
