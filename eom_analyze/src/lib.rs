//! Eye-diagram analysis engine.
//!
//! Reconstructs dense per-lane timing x voltage grids from a `.eom` report
//! stream, locates the true eye center on the zero-voltage row and
//! evaluates every grid cell against the gear-mandated diamond mask.
//!
//! # Module Structure
//!
//! - [`dataset`] - report parsing and rectangular grid synthesis
//! - [`center`] - error-onset boundary walk and eye center estimation
//! - [`mask`] - diamond mask membership and per-lane/per-run verdicts
//! - [`error`] - analysis error taxonomy

pub mod center;
pub mod dataset;
pub mod error;
pub mod mask;

pub use error::AnalyzeError;
