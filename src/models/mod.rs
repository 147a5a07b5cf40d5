//! Facilitation curve model.
//!
//! The model is implemented as small, pure functions so that simulation and
//! scoring code can stay generic over parameter values.

pub mod model;

pub use model::*;
