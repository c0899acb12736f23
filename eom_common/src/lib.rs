//! EOM Common Library
//!
//! Shared definitions for the UFS M-PHY Eye-Opening-Monitor workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - UIC MIB attribute IDs and protocol constants
//! - [`types`] - Core data model (sides, gears, capabilities, scan points)
//! - [`report`] - `.eom` report stream grammar (writer and parser)
//!
//! The acquisition binary writes a report stream through [`report`]; the
//! analysis binary reads the same stream back. Both sides share the data
//! model in [`types`], so the grammar is defined exactly once.

pub mod consts;
pub mod report;
pub mod types;
