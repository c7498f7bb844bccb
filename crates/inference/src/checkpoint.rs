//! Checkpoint resolution
//!
//! Turns `inference.model_to_load` into a concrete checkpoint path. The
//! `"default"` sentinel is resolved here, never in the config loader, so the
//! bundled checkpoint location has a single source of truth.

use fbs_config::InferenceConfig;
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name of the bundled checkpoint inside the models directory
pub const DEFAULT_CHECKPOINT_FILE: &str = "checkpoint_dynUnet_DiceXent.pt";

/// Models directory used when neither a CLI flag nor `FBS_MODELS_DIR` is given
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Environment variable overriding the models directory
pub const MODELS_DIR_ENV: &str = "FBS_MODELS_DIR";

/// Error type for checkpoint resolution
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Cannot find model: {}", path.display())]
    NotFound { path: PathBuf },
}

/// Where a resolved checkpoint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointSource {
    /// `"default"` resolved to the bundled checkpoint
    BuiltIn,
    /// Path given verbatim in the configuration
    UserSupplied,
}

/// Checkpoint chosen for an inference run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCheckpoint {
    pub path: PathBuf,
    pub source: CheckpointSource,
}

/// Resolves `model_to_load` against a models directory
#[derive(Debug, Clone)]
pub struct CheckpointResolver {
    models_dir: PathBuf,
    require_existing: bool,
}

impl CheckpointResolver {
    pub fn new<P: Into<PathBuf>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.into(),
            require_existing: true,
        }
    }

    /// Pick the models directory: explicit value, then `FBS_MODELS_DIR`, then `models`
    pub fn models_dir_from(explicit: Option<&Path>) -> PathBuf {
        if let Some(dir) = explicit {
            return dir.to_path_buf();
        }
        env::var_os(MODELS_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR))
    }

    /// Skip the existence check (for dry runs where checkpoints live elsewhere)
    pub fn without_existence_check(mut self) -> Self {
        self.require_existing = false;
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Location of the bundled checkpoint
    pub fn default_checkpoint(&self) -> PathBuf {
        self.models_dir.join(DEFAULT_CHECKPOINT_FILE)
    }

    /// Resolve the checkpoint named by the configuration
    ///
    /// `"default"` maps to the bundled checkpoint; any other value is used
    /// verbatim. The result must be an existing regular file unless the
    /// existence check is disabled.
    pub fn resolve(&self, cfg: &InferenceConfig) -> Result<ResolvedCheckpoint, CheckpointError> {
        let (path, source) = if cfg.uses_default_model() {
            (self.default_checkpoint(), CheckpointSource::BuiltIn)
        } else {
            (
                PathBuf::from(&cfg.model_to_load),
                CheckpointSource::UserSupplied,
            )
        };

        if self.require_existing && !path.is_file() {
            return Err(CheckpointError::NotFound { path });
        }

        debug!(path = %path.display(), ?source, "checkpoint resolved");
        Ok(ResolvedCheckpoint { path, source })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use fbs_config::DEFAULT_MODEL;
    use std::fs;

    fn inference_with_model(model: &str) -> InferenceConfig {
        InferenceConfig {
            nr_out_channels: 2,
            inplane_size: [448, 512],
            spacing: [0.8, 0.8, -1.0],
            batch_size_inference: 1,
            probability_threshold: 0.5,
            model_to_load: model.to_string(),
        }
    }

    #[test]
    fn test_default_resolves_to_bundled_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DEFAULT_CHECKPOINT_FILE), b"weights").unwrap();

        let resolved = CheckpointResolver::new(dir.path())
            .resolve(&inference_with_model(DEFAULT_MODEL))
            .unwrap();

        assert_eq!(resolved.path, dir.path().join(DEFAULT_CHECKPOINT_FILE));
        assert_eq!(resolved.source, CheckpointSource::BuiltIn);
    }

    #[test]
    fn test_user_path_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("finetuned.pt");
        fs::write(&custom, b"weights").unwrap();

        let resolved = CheckpointResolver::new("/nonexistent/models")
            .resolve(&inference_with_model(custom.to_str().unwrap()))
            .unwrap();

        assert_eq!(resolved.path, custom);
        assert_eq!(resolved.source, CheckpointSource::UserSupplied);
    }

    #[test]
    fn test_missing_checkpoint_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CheckpointResolver::new(dir.path())
            .resolve(&inference_with_model(DEFAULT_MODEL))
            .unwrap_err();

        assert!(err.to_string().starts_with("Cannot find model"));
    }

    #[test]
    fn test_directory_is_not_a_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let result = CheckpointResolver::new("models")
            .resolve(&inference_with_model(dir.path().to_str().unwrap()));

        assert!(matches!(result, Err(CheckpointError::NotFound { .. })));
    }

    #[test]
    fn test_existence_check_can_be_skipped() {
        let resolved = CheckpointResolver::new("/nonexistent/models")
            .without_existence_check()
            .resolve(&inference_with_model(DEFAULT_MODEL))
            .unwrap();

        assert_eq!(
            resolved.path,
            PathBuf::from("/nonexistent/models").join(DEFAULT_CHECKPOINT_FILE)
        );
    }

    #[test]
    fn test_explicit_models_dir_wins() {
        let dir = CheckpointResolver::models_dir_from(Some(Path::new("/opt/fbs/models")));
        assert_eq!(dir, PathBuf::from("/opt/fbs/models"));
    }
}
