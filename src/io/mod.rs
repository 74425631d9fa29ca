//! Persistence of quote artifacts.

pub mod export;
