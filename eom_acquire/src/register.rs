//! Register access seam.
//!
//! The sweep driver only ever touches the device through this trait, which
//! keeps the protocol state machine fully testable against a scripted mock
//! and keeps the vendor-CLI transport out of the core.

use eom_common::types::{Direction, Side};

/// UIC attribute access for one opened device.
///
/// Reads target the side the implementation was opened for. `None` from
/// [`read`](RegisterAccess::read) means a transport failure; the caller
/// aborts, it never retries. Writes carry the side explicitly because the
/// driver mixes swept-side EOM writes with local TX attribute writes, and
/// the transport reports no usable write status — failures are logged by
/// the implementation.
pub trait RegisterAccess {
    /// Read a UIC attribute. `lane` selects the per-lane instance where the
    /// attribute has one.
    fn read(&self, lane: Option<u8>, index: u16, direction: Direction) -> Option<u32>;

    /// Write a UIC attribute on the given side.
    fn write(&self, lane: Option<u8>, index: u16, value: u32, direction: Direction, side: Side);
}
