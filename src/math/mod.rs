//! Mathematical utilities: the ramp basis function and binned statistics.

pub mod basis;
pub mod stats;

pub use basis::*;
pub use stats::*;
