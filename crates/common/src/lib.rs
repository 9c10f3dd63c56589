//! Shared configuration, error types and identifiers for the FFQ plan translator crates.
//!
//! Architecture role:
//! - provides the common [`FfqError`] / [`Result`] contracts used by every
//!   conversion step
//! - defines [`ConverterConfig`], passed by value into each converter
//! - hosts typed plan-node identifiers
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`ids`]

pub mod config;
pub mod error;
pub mod ids;

pub use config::ConverterConfig;
pub use error::{FfqError, Result};
pub use ids::*;
