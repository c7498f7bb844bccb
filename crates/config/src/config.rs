//! Core configuration structures and loading logic

use crate::error::ConfigError;
use crate::validate::validate_config;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Sentinel for `inference.model_to_load` selecting the bundled checkpoint
pub const DEFAULT_MODEL: &str = "default";

/// Device-related configuration
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Number of data loading workers (0 = load on the calling thread)
    pub num_workers: u32,
}

/// Inference-related configuration
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InferenceConfig {
    /// Number of output class channels
    pub nr_out_channels: u32,
    /// Target 2D patch height and width
    pub inplane_size: [u32; 2],
    /// Target voxel spacing in mm; -1.0 keeps the original spacing on that axis
    pub spacing: [f64; 3],
    /// Batch size used at inference (1 recommended)
    pub batch_size_inference: u32,
    /// Decision boundary turning probabilities into hard labels
    pub probability_threshold: f64,
    /// `"default"` or a path to a checkpoint
    pub model_to_load: String,
}

impl InferenceConfig {
    /// 3D patch extracted from the volume: the in-plane size with a single slice
    pub fn patch_size(&self) -> [u32; 3] {
        [self.inplane_size[0], self.inplane_size[1], 1]
    }

    /// Whether `model_to_load` is the `"default"` sentinel
    pub fn uses_default_model(&self) -> bool {
        self.model_to_load == DEFAULT_MODEL
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Config {
    pub device: DeviceConfig,
    pub inference: InferenceConfig,
}

impl Config {
    /// Load and validate configuration from a YAML file
    ///
    /// Every key is required. The environment is never consulted; see
    /// [`Config::load_with_env`] for overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_unvalidated(path.as_ref())?;
        config.validate()?;
        debug!(path = %path.as_ref().display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        let config = Self::from_document(serde_yaml::from_str(content)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its range constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config(self)
    }

    /// Serialize the configuration back to YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    fn load_unvalidated(path: &Path) -> Result<Self, ConfigError> {
        // Read raw bytes so that invalid UTF-8 surfaces as a parse error, not an I/O error.
        let content = fs::read(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_document(serde_yaml::from_slice(&content)?)
    }

    // Malformed YAML was rejected by the caller; everything here is a schema error.
    fn from_document(root: Value) -> Result<Self, ConfigError> {
        let root = match root {
            Value::Mapping(mapping) => mapping,
            Value::Null => Mapping::new(),
            other => {
                return Err(ConfigError::schema(
                    "<root>",
                    format!("expected a mapping with `device` and `inference`, got {}", kind(&other)),
                ))
            }
        };

        let device = section(&root, "device")?;
        let inference = section(&root, "inference")?;

        Ok(Self {
            device: DeviceConfig {
                num_workers: field(device, "device", "num_workers", "a non-negative integer")?,
            },
            inference: InferenceConfig {
                nr_out_channels: field(
                    inference,
                    "inference",
                    "nr_out_channels",
                    "a positive integer",
                )?,
                inplane_size: field(
                    inference,
                    "inference",
                    "inplane_size",
                    "a list of two positive integers",
                )?,
                spacing: field(inference, "inference", "spacing", "a list of three numbers")?,
                batch_size_inference: field(
                    inference,
                    "inference",
                    "batch_size_inference",
                    "a positive integer",
                )?,
                probability_threshold: field(
                    inference,
                    "inference",
                    "probability_threshold",
                    "a number in [0.0, 1.0]",
                )?,
                model_to_load: field(
                    inference,
                    "inference",
                    "model_to_load",
                    "\"default\" or a checkpoint path",
                )?,
            },
        })
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - FBS_NUM_WORKERS -> device.num_workers
    /// - FBS_BATCH_SIZE_INFERENCE -> inference.batch_size_inference
    /// - FBS_PROBABILITY_THRESHOLD -> inference.probability_threshold
    /// - FBS_MODEL_TO_LOAD -> inference.model_to_load
    ///
    /// Values that fail to parse are ignored and the file value is kept.
    pub fn apply_env_overrides(&mut self) {
        if let Some(workers) = env_parse::<u32>("FBS_NUM_WORKERS") {
            self.device.num_workers = workers;
        }

        if let Some(batch) = env_parse::<u32>("FBS_BATCH_SIZE_INFERENCE") {
            self.inference.batch_size_inference = batch;
        }

        if let Some(threshold) = env_parse::<f64>("FBS_PROBABILITY_THRESHOLD") {
            self.inference.probability_threshold = threshold;
        }

        if let Ok(model) = env::var("FBS_MODEL_TO_LOAD") {
            self.inference.model_to_load = model;
        }
    }

    /// Load configuration from file, apply environment overrides, then validate
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_unvalidated(path.as_ref())?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.as_ref().display(), "configuration loaded with environment overrides");
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

fn section<'a>(root: &'a Mapping, name: &str) -> Result<&'a Mapping, ConfigError> {
    match root.get(name) {
        Some(Value::Mapping(mapping)) => Ok(mapping),
        Some(other) => Err(ConfigError::schema(
            name,
            format!("expected a mapping, got {}", kind(other)),
        )),
        None => Err(ConfigError::schema(name, "missing required section")),
    }
}

fn field<T: DeserializeOwned>(
    section: &Mapping,
    section_name: &str,
    key: &str,
    expected: &str,
) -> Result<T, ConfigError> {
    let dotted = format!("{}.{}", section_name, key);
    let value = section
        .get(key)
        .ok_or_else(|| ConfigError::schema(&dotted, "missing required key"))?;
    serde_yaml::from_value(value.clone())
        .map_err(|e| ConfigError::schema(&dotted, format!("expected {}: {}", expected, e)))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
