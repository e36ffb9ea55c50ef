//! magmap-stats - Statistical functions for survey grid display
//!
//! This crate provides the statistical primitives the display pipeline needs:
//!
//! - **CumulativeDistribution**: fixed-bin empirical CDF used for
//!   histogram-equalized color scales
//! - **SummaryStats**: min/max/mean/spread of the finite values of a grid
//! - **percentile**: linear-interpolated percentiles for robust color limits
//!
//! Non-finite values (the missing-cell marker of a masked grid) are ignored
//! everywhere.

pub mod histogram;
pub mod summary;

pub use histogram::*;
pub use summary::*;
