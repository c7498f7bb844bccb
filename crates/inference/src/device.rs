//! Device planning for the inference pipeline
//!
//! Derives the data loading worker setup from `device.num_workers` and the
//! available CPU cores, and parses the compute device selection.

use fbs_config::DeviceConfig;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Error type for device selection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Invalid compute device '{0}': expected 'cpu' or 'cuda:<index>'")]
    InvalidDevice(String),
}

/// Compute device the network runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "index")]
pub enum ComputeDevice {
    #[default]
    Cpu,
    Cuda(u32),
}

impl FromStr for ComputeDevice {
    type Err = DeviceError;

    /// Accepts `cpu`, `cuda` (device 0) and `cuda:<index>`, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "cpu" => Ok(ComputeDevice::Cpu),
            "cuda" => Ok(ComputeDevice::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|index| index.parse().ok())
                .map(ComputeDevice::Cuda)
                .ok_or_else(|| DeviceError::InvalidDevice(s.to_string())),
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Cpu => write!(f, "cpu"),
            ComputeDevice::Cuda(index) => write!(f, "cuda:{}", index),
        }
    }
}

/// Data loading plan derived from configuration and system resources
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevicePlan {
    /// Device the network runs on
    pub compute: ComputeDevice,
    /// Number of parallel data loading workers
    pub loader_workers: u32,
    /// Data is loaded on the calling thread (no workers)
    pub in_process_loading: bool,
    /// Logical CPU cores available to the process
    pub available_cores: u32,
    /// More loader workers requested than cores available
    pub oversubscribed: bool,
}

impl DevicePlan {
    /// Derive a device plan from configuration
    ///
    /// Uses the following rules:
    /// - Detects CPU cores via num_cpus if `available_cores` is None
    /// - `num_workers = 0` loads data on the calling thread
    /// - More workers than cores is allowed but flagged as oversubscribed
    pub fn derive(cfg: &DeviceConfig, compute: ComputeDevice, available_cores: Option<u32>) -> Self {
        let available_cores = available_cores.unwrap_or_else(|| num_cpus::get() as u32);
        let loader_workers = cfg.num_workers;
        let oversubscribed = loader_workers > available_cores;

        if oversubscribed {
            warn!(
                loader_workers,
                available_cores, "more data loading workers requested than CPU cores available"
            );
        }

        Self {
            compute,
            loader_workers,
            in_process_loading: loader_workers == 0,
            available_cores,
            oversubscribed,
        }
    }

    /// Number of threads touching input data: the workers, or the caller alone
    pub fn loading_threads(&self) -> u32 {
        self.loader_workers.max(1)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_worker_count_preserved(
            workers in 0u32..256,
            cores in 1u32..256,
        ) {
            let plan = DevicePlan::derive(
                &DeviceConfig { num_workers: workers },
                ComputeDevice::Cpu,
                Some(cores),
            );

            prop_assert_eq!(plan.loader_workers, workers);
            prop_assert_eq!(plan.available_cores, cores);
            prop_assert_eq!(plan.in_process_loading, workers == 0);
            prop_assert_eq!(plan.oversubscribed, workers > cores);
            prop_assert!(plan.loading_threads() >= 1);
        }

        #[test]
        fn prop_cuda_index_round_trip(index in 0u32..64) {
            let device: ComputeDevice = format!("cuda:{}", index).parse().unwrap();
            prop_assert_eq!(device, ComputeDevice::Cuda(index));
            prop_assert_eq!(device.to_string(), format!("cuda:{}", index));
        }
    }

    #[test]
    fn test_zero_workers_loads_in_process() {
        let plan = DevicePlan::derive(&DeviceConfig { num_workers: 0 }, ComputeDevice::Cpu, Some(8));
        assert!(plan.in_process_loading);
        assert_eq!(plan.loading_threads(), 1);
    }

    #[test]
    fn test_detected_cores_used_when_unspecified() {
        let plan = DevicePlan::derive(&DeviceConfig { num_workers: 1 }, ComputeDevice::Cpu, None);
        assert_eq!(plan.available_cores, num_cpus::get() as u32);
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("cpu".parse::<ComputeDevice>(), Ok(ComputeDevice::Cpu));
        assert_eq!("CUDA".parse::<ComputeDevice>(), Ok(ComputeDevice::Cuda(0)));
        assert_eq!("cuda:1".parse::<ComputeDevice>(), Ok(ComputeDevice::Cuda(1)));
        assert_eq!(
            "tpu".parse::<ComputeDevice>(),
            Err(DeviceError::InvalidDevice("tpu".to_string()))
        );
        assert!("cuda:x".parse::<ComputeDevice>().is_err());
    }
}
