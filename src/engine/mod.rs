//! Sizing and pricing pipeline.
//!
//! Every stage is a pure function of its inputs; [`quote::run_pipeline`]
//! sequences them and [`quote::QuoteEngine`] adds lookup and caching.

pub mod audit;
pub mod baseline;
pub mod financial;
pub mod fingerprint;
pub mod inputs;
pub mod margin;
pub mod quote;
pub mod sizer;
pub mod solar;
pub mod tier;

pub use inputs::{FacilityInputs, OptionsInput, QuoteRequest};
pub use quote::{Quote, QuoteEngine, TierView, select_tier};
pub use tier::TierKey;
