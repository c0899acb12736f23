//! Link traffic generation during polling.
//!
//! An idle link gives the monitor nothing to count. The vendor tool can
//! move a patterned scratch file across the storage link on every poll
//! iteration so the receiver under test sees live data: writes toward the
//! device exercise its Rx, reads exercise the host Rx. The sweep driver
//! only sees this seam; the transport decides what a burst looks like.

/// One burst of data across the link, fired between status polls.
pub trait TrafficSource {
    /// Move one burst. `false` means the burst could not be issued; the
    /// sweep treats that as fatal, matching a dead transport.
    fn exercise(&self) -> bool;
}
