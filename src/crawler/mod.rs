//! Crawler module for fetching, persisting and orchestrating a harvest
//!
//! This module contains the core pipeline logic, including:
//! - HTTP fetching with politeness spacing and retry
//! - Idempotent record persistence
//! - Cover image downloads
//! - Overall run coordination

mod assets;
mod coordinator;
mod fetcher;
mod sink;
mod throttle;

pub use assets::AssetStore;
pub use coordinator::{run_harvest, Coordinator};
pub use fetcher::{backoff_delay, Fetcher};
pub use sink::IdempotentSink;
pub use throttle::RateGate;
