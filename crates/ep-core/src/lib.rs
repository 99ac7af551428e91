//! Configuration, shared types, and level conversions for envpeak.
//!
//! This crate holds everything the DSP crate and the binary agree on:
//! the TOML configuration, the emission type delivered to the outlets,
//! and the linear-to-decibel conversion.

pub mod config;
pub mod error;
pub mod level;
pub mod traits;

pub use config::EnvpeakConfig;
pub use error::CoreError;
pub use level::{DbConvention, Emission, pow_to_db};
pub use traits::{EmissionSink, FnSink};
