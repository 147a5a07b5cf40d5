//! `fac-curves` library crate.
//!
//! The binary (`fac`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - simulation and scoring are reusable outside the CLI
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod sim;
pub mod tui;
