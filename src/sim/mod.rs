//! Stochastic trial simulation.
//!
//! - the simulation time grid (`grid`)
//! - per-trial onset draws and curve evaluation (`trials`)
//! - curve values at the TMS probe times (`probe`)

pub mod grid;
pub mod probe;
pub mod trials;

pub use grid::*;
pub use probe::*;
pub use trials::*;
