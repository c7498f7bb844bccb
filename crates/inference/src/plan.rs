//! Inference plan assembly
//!
//! Combines a validated configuration with system resources into everything
//! an inference engine needs before touching any image: device setup,
//! checkpoint, patch geometry, network topology, resampling and thresholding.

use crate::checkpoint::{CheckpointError, CheckpointResolver, ResolvedCheckpoint};
use crate::device::{ComputeDevice, DeviceError, DevicePlan};
use crate::postprocess::Binarizer;
use crate::preprocess::TargetSpacing;
use crate::topology::Topology;
use fbs_config::{Config, ConfigError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Batch size the inference engine is tuned for
pub const RECOMMENDED_BATCH_SIZE: u32 = 1;

/// Error type for plan preparation
#[derive(Debug, Error)]
pub enum PlanError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Checkpoint could not be resolved
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Compute device could not be selected
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Options that come from the caller rather than the configuration file
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Directory holding the bundled checkpoint
    pub models_dir: PathBuf,
    /// Compute device, e.g. `cpu` or `cuda:0`
    pub device: String,
    /// Logical cores to plan for (auto-detected if None)
    pub available_cores: Option<u32>,
    /// Fail when the checkpoint file does not exist
    pub require_checkpoint: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            models_dir: CheckpointResolver::models_dir_from(None),
            device: ComputeDevice::default().to_string(),
            available_cores: None,
            require_checkpoint: true,
        }
    }
}

/// Everything derived from the configuration for one inference run
#[derive(Debug, Clone, Serialize)]
pub struct InferencePlan {
    pub device: DevicePlan,
    pub checkpoint: ResolvedCheckpoint,
    pub nr_out_channels: u32,
    pub batch_size: u32,
    /// 3D patch: in-plane size with a single slice
    pub patch_size: [u32; 3],
    pub topology: Topology,
    /// In-plane size is a multiple of the topology's downsampling factor
    pub patch_divisible: bool,
    pub target_spacing: TargetSpacing,
    pub binarizer: Binarizer,
}

impl InferencePlan {
    /// Prepare a plan from an already validated configuration
    ///
    /// Batch sizes other than 1 and patch sizes not divisible by the network's
    /// downsampling factor are reported as warnings; the model builder decides
    /// whether to reject them.
    pub fn prepare(config: &Config, options: &PlanOptions) -> Result<Self, PlanError> {
        let inference = &config.inference;

        let compute: ComputeDevice = options.device.parse()?;
        let device = DevicePlan::derive(&config.device, compute, options.available_cores);

        let mut resolver = CheckpointResolver::new(&options.models_dir);
        if !options.require_checkpoint {
            resolver = resolver.without_existence_check();
        }
        let checkpoint = resolver.resolve(inference)?;

        if inference.batch_size_inference != RECOMMENDED_BATCH_SIZE {
            warn!(
                batch_size = inference.batch_size_inference,
                recommended = RECOMMENDED_BATCH_SIZE,
                "batch size differs from the recommended inference batch size"
            );
        }

        let target_spacing = TargetSpacing::new(inference.spacing);
        let topology = Topology::derive(inference.inplane_size, target_spacing.inplane());
        let divisible = topology.divides(inference.inplane_size);
        let patch_divisible = divisible.iter().all(|&d| d);
        if !patch_divisible {
            warn!(
                inplane_size = ?inference.inplane_size,
                downsampling_factor = ?topology.downsampling_factor(),
                "in-plane size is not a multiple of the network downsampling factor"
            );
        }

        info!(
            device = %device.compute,
            workers = device.loader_workers,
            checkpoint = %checkpoint.path.display(),
            levels = topology.depth(),
            "inference plan prepared"
        );

        Ok(Self {
            device,
            checkpoint,
            nr_out_channels: inference.nr_out_channels,
            batch_size: inference.batch_size_inference,
            patch_size: inference.patch_size(),
            topology,
            patch_divisible,
            target_spacing,
            binarizer: Binarizer::new(inference.probability_threshold),
        })
    }

    /// Load configuration with environment overrides and prepare a plan
    pub fn from_path<P: AsRef<Path>>(path: P, options: &PlanOptions) -> Result<Self, PlanError> {
        let config = Config::load_with_env(path)?;
        Self::prepare(&config, options)
    }

    /// Render the plan as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointSource, DEFAULT_CHECKPOINT_FILE};
    use std::fs;

    const SAMPLE: &str = r#"
device:
  num_workers: 1
inference:
  nr_out_channels: 2
  inplane_size: [448, 512]
  spacing: [0.8, 0.8, -1.0]
  batch_size_inference: 1
  probability_threshold: 0.5
  model_to_load: "default"
"#;

    fn options_for(models_dir: &Path) -> PlanOptions {
        PlanOptions {
            models_dir: models_dir.to_path_buf(),
            device: "cpu".to_string(),
            available_cores: Some(8),
            require_checkpoint: true,
        }
    }

    #[test]
    fn test_prepare_reference_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DEFAULT_CHECKPOINT_FILE), b"weights").unwrap();
        let config = Config::parse_yaml(SAMPLE).unwrap();

        let plan = InferencePlan::prepare(&config, &options_for(dir.path())).unwrap();

        assert_eq!(plan.device.loader_workers, 1);
        assert_eq!(plan.device.compute, ComputeDevice::Cpu);
        assert_eq!(plan.checkpoint.source, CheckpointSource::BuiltIn);
        assert_eq!(plan.nr_out_channels, 2);
        assert_eq!(plan.batch_size, 1);
        assert_eq!(plan.patch_size, [448, 512, 1]);
        assert!(plan.patch_divisible);
        assert_eq!(plan.target_spacing.resolve([0.5, 0.5, 3.0]), [0.8, 0.8, 3.0]);
        assert_eq!(plan.binarizer.threshold(), 0.5);
    }

    #[test]
    fn test_missing_checkpoint_fails_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::parse_yaml(SAMPLE).unwrap();

        let err = InferencePlan::prepare(&config, &options_for(dir.path())).unwrap_err();
        assert!(matches!(err, PlanError::Checkpoint(_)));
    }

    #[test]
    fn test_invalid_device_fails_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::parse_yaml(SAMPLE).unwrap();
        let options = PlanOptions {
            device: "gpu-please".to_string(),
            require_checkpoint: false,
            ..options_for(dir.path())
        };

        let err = InferencePlan::prepare(&config, &options).unwrap_err();
        assert!(matches!(err, PlanError::Device(_)));
    }

    #[test]
    fn test_non_divisible_patch_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::parse_yaml(&SAMPLE.replace("[448, 512]", "[450, 500]")).unwrap();
        let options = PlanOptions {
            require_checkpoint: false,
            ..options_for(dir.path())
        };

        let plan = InferencePlan::prepare(&config, &options).unwrap();
        assert!(!plan.patch_divisible);
    }

    #[test]
    fn test_from_path_propagates_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = InferencePlan::from_path(dir.path().join("missing.yml"), &options_for(dir.path()))
            .unwrap_err();

        match err {
            PlanError::Config(inner) => assert!(inner.is_not_found()),
            other => panic!("expected config error, got {}", other),
        }
    }

    #[test]
    fn test_plan_serializes_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::parse_yaml(SAMPLE).unwrap();
        let options = PlanOptions {
            require_checkpoint: false,
            ..options_for(dir.path())
        };

        let plan = InferencePlan::prepare(&config, &options).unwrap();
        let json: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();

        assert_eq!(json["patch_size"], serde_json::json!([448, 512, 1]));
        assert_eq!(json["checkpoint"]["source"], "built_in");
        assert_eq!(json["device"]["compute"]["kind"], "cpu");
        assert_eq!(json["binarizer"]["threshold"], 0.5);
    }
}
