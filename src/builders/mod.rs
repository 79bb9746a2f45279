//! Builders
//!
//! Fluent builder for IDX client configuration.

pub mod config;

pub use config::{idx_config, IdxConfigBuilder};
