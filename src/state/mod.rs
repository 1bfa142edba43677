//! State module for tracking run progress
//!
//! # Components
//!
//! - `RunPhase`: the phase a harvest run is in (discovering, listing, extracting, draining, ...)

mod run_phase;

pub use run_phase::RunPhase;
