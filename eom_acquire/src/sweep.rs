//! Per-point scan state machine and per-lane sweep loop.
//!
//! Each scan point walks `Configuring -> Polling -> Done`, or ends in
//! `Aborted` when a register read fails, the poll budget runs out or the
//! user interrupts the run. Points are strictly sequential: all of them
//! share one physical register set, so a point is fully configured, started
//! and polled to completion before the next one is programmed.

use crate::error::AcquireError;
use crate::register::RegisterAccess;
use crate::traffic::TrafficSource;
use eom_common::consts::{
    DME_VS_UNIPRO_STATE, DME_VS_UNIPRO_STATE_LINK_UP, DME_VS_UNIPRO_STATE_MASK,
    EOM_DIRECTION_SHIFT, EOM_ERROR_COUNT_THRESHOLD, EOM_STEP_MASK, PA_NO_ADAPT, PA_PWRMODE,
    PA_PWRMODE_FAST_BOTH, PA_TXHSADAPTTYPE, RX_EYEMON_ENABLE, RX_EYEMON_ERROR_COUNT,
    RX_EYEMON_START, RX_EYEMON_START_MASK, RX_EYEMON_TARGET_TEST_COUNT, RX_EYEMON_TESTED_COUNT,
    RX_EYEMON_TIMING_STEPS, RX_EYEMON_VOLTAGE_STEPS,
};
use eom_common::report::ReportWriter;
use eom_common::types::{Direction, ErrorCount, ScanPoint, Side, SweepCapabilities};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// Bound on the status-register busy-wait.
///
/// The vendor tool polls unboundedly; the default here converts a stuck
/// device into an abort instead of a hang. [`PollPolicy::unbounded`]
/// restores the original semantics for callers that want them.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    max_attempts: Option<u32>,
}

impl PollPolicy {
    /// Abort after `max_attempts` status reads without completion.
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
        }
    }

    /// Busy-wait forever, as the vendor tool does.
    pub fn unbounded() -> Self {
        Self { max_attempts: None }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::bounded(100_000)
    }
}

/// Encode a signed sweep offset as the 7-bit signed-magnitude register
/// value: bit 6 = direction (1 = left/minus), bits 5..0 = magnitude.
pub fn encode_offset(value: i32) -> u32 {
    let direction = u32::from(value < 0);
    (direction << EOM_DIRECTION_SHIFT) | (value.unsigned_abs() & EOM_STEP_MASK)
}

/// Sweeps one lane's full timing x voltage grid through [`RegisterAccess`].
pub struct SweepDriver<'a, R: RegisterAccess> {
    regs: &'a R,
    side: Side,
    caps: SweepCapabilities,
    policy: PollPolicy,
    running: Arc<AtomicBool>,
    traffic: Option<&'a dyn TrafficSource>,
}

impl<'a, R: RegisterAccess> SweepDriver<'a, R> {
    pub fn new(
        regs: &'a R,
        side: Side,
        caps: SweepCapabilities,
        policy: PollPolicy,
        running: Arc<AtomicBool>,
        traffic: Option<&'a dyn TrafficSource>,
    ) -> Self {
        Self {
            regs,
            side,
            caps,
            policy,
            running,
            traffic,
        }
    }

    /// Sweep one lane, timing as the outer loop and voltage as the inner
    /// loop, both from `-max` to `+max`. `single_voltage` pins the inner
    /// value instead of sweeping it.
    ///
    /// RX_EYEMON_Enable is set before the first point and reset on every
    /// exit path, successful or aborted.
    pub fn sweep_lane<W: Write>(
        &self,
        lane: u8,
        single_voltage: Option<i32>,
        sink: &mut ReportWriter<W>,
    ) -> Result<u64, AcquireError> {
        self.set_enable(lane, true);
        let result = self.sweep_lane_inner(lane, single_voltage, sink);
        self.set_enable(lane, false);
        result
    }

    fn sweep_lane_inner<W: Write>(
        &self,
        lane: u8,
        single_voltage: Option<i32>,
        sink: &mut ReportWriter<W>,
    ) -> Result<u64, AcquireError> {
        let mut points = 0u64;
        for timing in self.caps.timing_range() {
            match single_voltage {
                Some(voltage) => {
                    let point = self.scan_point(lane, timing, voltage)?;
                    sink.record(&point)?;
                    points += 1;
                }
                None => {
                    for voltage in self.caps.voltage_range() {
                        let point = self.scan_point(lane, timing, voltage)?;
                        sink.record(&point)?;
                        points += 1;
                    }
                }
            }
        }
        Ok(points)
    }

    /// Run one scan point to completion: `Configuring -> Polling -> Done`.
    pub fn scan_point(
        &self,
        lane: u8,
        timing: i32,
        voltage: i32,
    ) -> Result<ScanPoint, AcquireError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(AcquireError::Interrupted);
        }

        self.configure(lane, timing, voltage)?;
        let error_count = self.poll(lane)?;

        trace!(lane, timing, voltage, error_count, "scan point accepted");
        Ok(ScanPoint {
            lane,
            timing,
            voltage,
            error_count: ErrorCount::Counted(error_count),
        })
    }

    /// `Configuring`: program the operating point, then trigger the
    /// re-adaptation / power-mode-change sequence that applies it and
    /// starts the test.
    fn configure(&self, lane: u8, timing: i32, voltage: i32) -> Result<(), AcquireError> {
        let rx = Direction::Rx;
        let side = self.side;
        self.regs
            .write(Some(lane), RX_EYEMON_TIMING_STEPS, encode_offset(timing), rx, side);
        self.regs
            .write(Some(lane), RX_EYEMON_VOLTAGE_STEPS, encode_offset(voltage), rx, side);
        self.regs.write(
            Some(lane),
            RX_EYEMON_TARGET_TEST_COUNT,
            self.caps.target_test_count as u32,
            rx,
            side,
        );

        // NO_ADAPT plus a power mode change to Fast Mode applies the new
        // operating point and kicks off the EOM. Both always go to the
        // local TX side.
        self.regs
            .write(None, PA_TXHSADAPTTYPE, PA_NO_ADAPT, Direction::Tx, Side::Local);
        self.regs
            .write(None, PA_PWRMODE, PA_PWRMODE_FAST_BOTH, Direction::Tx, Side::Local);

        self.await_power_mode_change()
    }

    /// Wait for the power mode change to settle. Controllers without the
    /// vendor UniPro-state attribute get a fixed delay instead.
    fn await_power_mode_change(&self) -> Result<(), AcquireError> {
        let mut attempts = 0u32;
        loop {
            match self.regs.read(None, DME_VS_UNIPRO_STATE, Direction::Tx) {
                None => {
                    // Attribute not supported; give the PMC time to finish.
                    std::thread::sleep(Duration::from_millis(200));
                    return Ok(());
                }
                Some(state) if state & DME_VS_UNIPRO_STATE_MASK == DME_VS_UNIPRO_STATE_LINK_UP => {
                    return Ok(());
                }
                Some(_) => {}
            }
            attempts += 1;
            if let Some(max) = self.policy.max_attempts {
                if attempts >= max {
                    return Err(AcquireError::PollBudgetExhausted { attempts });
                }
            }
        }
    }

    /// `Polling`: busy-wait on RX_EYEMON_Start, then read the counters and
    /// apply the stop criterion. The monitor restarts itself until the
    /// criterion holds, so an unmet criterion loops back into the wait.
    fn poll(&self, lane: u8) -> Result<u32, AcquireError> {
        let mut attempts = 0u32;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Err(AcquireError::Interrupted);
            }
            attempts += 1;
            if let Some(max) = self.policy.max_attempts {
                if attempts > max {
                    return Err(AcquireError::PollBudgetExhausted { attempts });
                }
            }

            // Keep the link busy while the monitor counts.
            if let Some(traffic) = self.traffic {
                if !traffic.exercise() {
                    return Err(AcquireError::TrafficFailed);
                }
            }

            let start = self
                .regs
                .read(Some(lane), RX_EYEMON_START, Direction::Rx)
                .ok_or(AcquireError::Transport {
                    attr: RX_EYEMON_START,
                    lane: Some(lane),
                })?;
            if start & RX_EYEMON_START_MASK != 0 {
                continue;
            }

            let tested = self
                .regs
                .read(Some(lane), RX_EYEMON_TESTED_COUNT, Direction::Rx)
                .ok_or(AcquireError::Transport {
                    attr: RX_EYEMON_TESTED_COUNT,
                    lane: Some(lane),
                })?;
            let errors = self
                .regs
                .read(Some(lane), RX_EYEMON_ERROR_COUNT, Direction::Rx)
                .ok_or(AcquireError::Transport {
                    attr: RX_EYEMON_ERROR_COUNT,
                    lane: Some(lane),
                })?;

            if tested >= self.caps.target_test_count as u32
                || errors >= EOM_ERROR_COUNT_THRESHOLD
            {
                return Ok(errors);
            }
        }
    }

    fn set_enable(&self, lane: u8, enable: bool) {
        debug!(lane, enable, "RX_EYEMON_Enable");
        self.regs.write(
            Some(lane),
            RX_EYEMON_ENABLE,
            u32::from(enable),
            Direction::Rx,
            self.side,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_magnitude_encoding() {
        assert_eq!(encode_offset(0), 0x00);
        assert_eq!(encode_offset(5), 0x05);
        assert_eq!(encode_offset(63), 0x3F);
        assert_eq!(encode_offset(-1), 0x41);
        assert_eq!(encode_offset(-63), 0x7F);
        // Magnitude is masked to the six-bit field.
        assert_eq!(encode_offset(64), 0x00);
        assert_eq!(encode_offset(-64), 0x40);
    }

    #[test]
    fn poll_policy_default_is_bounded() {
        assert!(PollPolicy::default().max_attempts.is_some());
        assert!(PollPolicy::unbounded().max_attempts.is_none());
        assert_eq!(PollPolicy::bounded(7).max_attempts, Some(7));
    }
}
