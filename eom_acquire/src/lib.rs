//! EOM acquisition protocol driver.
//!
//! Programs Eye-Opening-Monitor sweep points into the PHY, polls each point
//! to completion and appends accepted measurements to a `.eom` report
//! stream.
//!
//! # Module Structure
//!
//! - [`register`] - `RegisterAccess` seam between the driver and the device
//! - [`traffic`] - `TrafficSource` seam for link exercise during polling
//! - [`lsufs`] - vendor-CLI adapter reaching the registers over `adb shell`
//! - [`sweep`] - per-point state machine and per-lane sweep loop
//! - [`core`] - whole-run orchestration (capability checks, header, lanes)
//! - [`error`] - acquisition error taxonomy

pub mod core;
pub mod error;
pub mod lsufs;
pub mod register;
pub mod sweep;
pub mod traffic;

pub use error::AcquireError;
