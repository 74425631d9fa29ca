//! Tiered energy-system sizing and pricing engine.
//!
//! Turns facility attributes into three battery-led system tiers
//! (Starter, Perfect Fit, Beast Mode), each with margined pricing,
//! incentives, savings and returns.

#[cfg(feature = "api")]
pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;

pub use catalog::Catalog;
pub use config::EngineConfig;
pub use engine::{Quote, QuoteEngine, QuoteRequest, TierKey};
pub use error::{EngineError, QuoteError, Stage};
