//! UIC MIB attribute IDs and protocol constants.
//!
//! Single source of truth for the M-PHY Eye-Opening-Monitor register map
//! and the fixed protocol thresholds. Imported by both the acquisition and
//! analysis crates — no duplication permitted.

/// RX_EYEMON_Capability. Bit 0 set means the PHY implements the EOM.
pub const RX_EYEMON_CAPABILITY: u16 = 0x00F1;

/// RX_EYEMON_Timing_MAX_Steps_Capability.
pub const RX_EYEMON_TIMING_MAX_STEPS_CAPABILITY: u16 = 0x00F2;

/// RX_EYEMON_Timing_MAX_Offset_Capability.
pub const RX_EYEMON_TIMING_MAX_OFFSET_CAPABILITY: u16 = 0x00F3;

/// RX_EYEMON_Voltage_MAX_Steps_Capability.
pub const RX_EYEMON_VOLTAGE_MAX_STEPS_CAPABILITY: u16 = 0x00F4;

/// RX_EYEMON_Voltage_MAX_Offset_Capability.
pub const RX_EYEMON_VOLTAGE_MAX_OFFSET_CAPABILITY: u16 = 0x00F5;

/// RX_EYEMON_Enable. 1 = test control enabled, 0 = disabled.
pub const RX_EYEMON_ENABLE: u16 = 0x00F6;

/// RX_EYEMON_Timing_Steps (signed-magnitude, bit 6 = direction).
pub const RX_EYEMON_TIMING_STEPS: u16 = 0x00F7;

/// RX_EYEMON_Voltage_Steps (signed-magnitude, bit 6 = direction).
pub const RX_EYEMON_VOLTAGE_STEPS: u16 = 0x00F8;

/// RX_EYEMON_Target_Test_Count.
pub const RX_EYEMON_TARGET_TEST_COUNT: u16 = 0x00F9;

/// RX_EYEMON_Tested_Count.
pub const RX_EYEMON_TESTED_COUNT: u16 = 0x00FA;

/// RX_EYEMON_Error_Count.
pub const RX_EYEMON_ERROR_COUNT: u16 = 0x00FB;

/// RX_EYEMON_Start. LSB set while the monitor is running.
pub const RX_EYEMON_START: u16 = 0x00FC;

/// Mask for the run bit of RX_EYEMON_Start.
pub const RX_EYEMON_START_MASK: u32 = 0x1;

/// PA_PWRMode. Writing [`PA_PWRMODE_FAST_BOTH`] triggers the power mode
/// change that applies a new EOM operating point.
pub const PA_PWRMODE: u16 = 0x1571;

/// Fast Mode on both directions (PWRMode value 0x11).
pub const PA_PWRMODE_FAST_BOTH: u32 = 0x11;

/// PA_RxGear. Current receive gear of the link.
pub const PA_RXGEAR: u16 = 0x1583;

/// PA_TxHsAdaptType.
pub const PA_TXHSADAPTTYPE: u16 = 0x15D4;

/// NO_ADAPT value for PA_TxHsAdaptType.
pub const PA_NO_ADAPT: u32 = 0x03;

/// Vendor-specific UniPro state attribute, polled to confirm a power mode
/// change completed. Not implemented by every controller.
pub const DME_VS_UNIPRO_STATE: u16 = 0xD000;

/// State field mask of [`DME_VS_UNIPRO_STATE`].
pub const DME_VS_UNIPRO_STATE_MASK: u32 = 0x7;

/// Link-up state of [`DME_VS_UNIPRO_STATE`].
pub const DME_VS_UNIPRO_STATE_LINK_UP: u32 = 0x2;

/// Bit 6 of the step registers selects the sweep direction
/// (1 = left/minus, 0 = right/plus).
pub const EOM_DIRECTION_SHIFT: u32 = 6;

/// Magnitude field of the step registers (bits 5..0).
pub const EOM_STEP_MASK: u32 = 0x3F;

/// A sample is accepted once the PHY error counter reaches this value,
/// even if the target test count has not been reached yet.
pub const EOM_ERROR_COUNT_THRESHOLD: u32 = 60;

/// Default RX_EYEMON_Target_Test_Count when not given on the CLI.
pub const EOM_TARGET_TEST_COUNT_DEFAULT: u8 = 0x5D;

/// Maximum legal RX_EYEMON_Target_Test_Count (7-bit register).
pub const EOM_TARGET_TEST_COUNT_MAX: u8 = 0x7F;

/// Reserved error-count sentinel meaning "no measurement for this cell".
pub const EOM_INVALID_ERROR_COUNT: u32 = 999;

/// Number of PHY data lanes.
pub const EOM_LANE_COUNT: u8 = 2;

/// Minimum PHY gear with a validated eye mask.
pub const EOM_MIN_GEAR: u8 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(EOM_ERROR_COUNT_THRESHOLD > 0);
        assert!(EOM_TARGET_TEST_COUNT_DEFAULT as u32 <= EOM_TARGET_TEST_COUNT_MAX as u32);
        // The sentinel must be outside the range a 7-bit test can produce.
        assert!(EOM_INVALID_ERROR_COUNT > EOM_TARGET_TEST_COUNT_MAX as u32);
        assert!(EOM_INVALID_ERROR_COUNT > EOM_ERROR_COUNT_THRESHOLD);
    }

    #[test]
    fn step_registers_are_seven_bit() {
        assert_eq!(EOM_STEP_MASK, (1 << EOM_DIRECTION_SHIFT) - 1);
    }
}
