//! Configuration for fetal brain segmentation inference
//!
//! Loads the YAML inference configuration, checks it against the schema and
//! optionally applies `FBS_*` environment overrides.

pub mod config;
pub mod error;
pub mod validate;

pub use config::*;
pub use error::ConfigError;
pub use validate::{is_valid_spacing, is_valid_threshold, SPACING_SENTINEL};
