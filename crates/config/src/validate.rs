//! Range and consistency checks for a parsed configuration

use crate::config::{Config, InferenceConfig};
use crate::error::ConfigError;

/// Spacing value meaning "keep the original spacing on this axis"
pub const SPACING_SENTINEL: f64 = -1.0;

/// Check whether a spacing component is usable
///
/// Valid components are strictly positive and finite, or exactly the -1.0 sentinel.
pub fn is_valid_spacing(value: f64) -> bool {
    value == SPACING_SENTINEL || (value.is_finite() && value > 0.0)
}

/// Check whether a probability threshold lies in [0, 1]
///
/// NaN is never a valid threshold.
pub fn is_valid_threshold(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

// `device.num_workers` is unsigned, so every parsed value is already valid.
pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    validate_inference(&config.inference)
}

fn validate_inference(inference: &InferenceConfig) -> Result<(), ConfigError> {
    if inference.nr_out_channels == 0 {
        return Err(ConfigError::schema(
            "inference.nr_out_channels",
            "must be a positive integer, got 0",
        ));
    }

    for (axis, size) in inference.inplane_size.iter().enumerate() {
        if *size == 0 {
            return Err(ConfigError::schema(
                format!("inference.inplane_size[{}]", axis),
                "must be a positive integer, got 0",
            ));
        }
    }

    for (axis, value) in inference.spacing.iter().enumerate() {
        if !is_valid_spacing(*value) {
            return Err(ConfigError::schema(
                format!("inference.spacing[{}]", axis),
                format!(
                    "must be > 0 or exactly {:.1} to keep the original spacing, got {}",
                    SPACING_SENTINEL, value
                ),
            ));
        }
    }

    if inference.batch_size_inference == 0 {
        return Err(ConfigError::schema(
            "inference.batch_size_inference",
            "must be a positive integer, got 0",
        ));
    }

    if !is_valid_threshold(inference.probability_threshold) {
        return Err(ConfigError::schema(
            "inference.probability_threshold",
            format!(
                "must lie in [0.0, 1.0], got {}",
                inference.probability_threshold
            ),
        ));
    }

    if inference.model_to_load.trim().is_empty() {
        return Err(ConfigError::schema(
            "inference.model_to_load",
            format!(
                "must be \"default\" or a checkpoint path, got an empty or blank value {:?}",
                inference.model_to_load
            ),
        ));
    }

    Ok(())
}
