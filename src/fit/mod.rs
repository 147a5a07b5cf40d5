//! Model fitting.
//!
//! Responsibilities:
//!
//! - score parameter vectors against the cohorts (`objective`)
//! - build the starting simplex (`simplex`)
//! - run Nelder-Mead and summarize the search (`optimizer`)

pub mod objective;
pub mod optimizer;
pub mod simplex;

pub use objective::*;
pub use optimizer::*;
pub use simplex::*;
