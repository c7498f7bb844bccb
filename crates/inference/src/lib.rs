//! Inference planning for fetal brain segmentation
//!
//! Consumes a validated configuration and derives the device setup, the
//! checkpoint to load, the network topology and the pre/post-processing
//! parameters of an inference run.

pub mod checkpoint;
pub mod device;
pub mod plan;
pub mod postprocess;
pub mod preprocess;
pub mod topology;

pub use fbs_config as config;
pub use fbs_config::Config;
pub use checkpoint::{
    CheckpointError, CheckpointResolver, CheckpointSource, ResolvedCheckpoint,
    DEFAULT_CHECKPOINT_FILE,
};
pub use device::{ComputeDevice, DeviceError, DevicePlan};
pub use plan::{InferencePlan, PlanError, PlanOptions};
pub use postprocess::Binarizer;
pub use preprocess::TargetSpacing;
pub use topology::Topology;
