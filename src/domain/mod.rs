//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - experimental cohorts and their probe times (`Cohort`)
//! - the four-parameter facilitation model (`FacParams`)
//! - scoring outputs (`CohortScore`, `Evaluation`)
//! - run configuration (`FitConfig`) and the saved fit file (`FitFile`)

pub mod types;

pub use types::*;
