use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Where a pipeline runs. Resolved once at construction; a loaded model is
/// never migrated between devices.
///
/// Serialized as `"cpu"`, `{"cuda": 0}` or `{"metal": 0}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRequest {
    #[default]
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl DeviceRequest {
    pub fn resolve(self) -> Result<Device> {
        match self {
            DeviceRequest::Cpu => Ok(Device::Cpu),
            DeviceRequest::Cuda(i) => Device::new_cuda(i).map_err(|e| {
                PipelineError::Device(format!(
                    "Failed to init CUDA device {i}: {e}. Try CPU as fallback."
                ))
            }),
            DeviceRequest::Metal(i) => Device::new_metal(i).map_err(|e| {
                PipelineError::Device(format!(
                    "Failed to init Metal device {i}: {e}. Try CPU as fallback."
                ))
            }),
        }
    }
}

macro_rules! impl_device_methods {
    (direct: $builder:ident < $($gen:ident : $bound:path),* >) => {
        impl<$($gen: $bound),*> $builder<$($gen),*> {
            /// Run on CPU (default).
            pub fn cpu(mut self) -> Self {
                self.device_request = crate::pipelines::utils::DeviceRequest::Cpu;
                self
            }

            /// Run on a specific CUDA GPU.
            pub fn cuda(mut self, index: usize) -> Self {
                self.device_request = crate::pipelines::utils::DeviceRequest::Cuda(index);
                self
            }

            /// Run on a specific Metal GPU.
            pub fn metal(mut self, index: usize) -> Self {
                self.device_request = crate::pipelines::utils::DeviceRequest::Metal(index);
                self
            }
        }
    };

    (config: $builder:ident < $($gen:ident : $bound:path),* >) => {
        impl<$($gen: $bound),*> $builder<$($gen),*> {
            /// Run on CPU (default).
            pub fn cpu(mut self) -> Self {
                self.config.device = crate::pipelines::utils::DeviceRequest::Cpu;
                self
            }

            /// Run on a specific CUDA GPU.
            pub fn cuda(mut self, index: usize) -> Self {
                self.config.device = crate::pipelines::utils::DeviceRequest::Cuda(index);
                self
            }

            /// Run on a specific Metal GPU.
            pub fn metal(mut self, index: usize) -> Self {
                self.config.device = crate::pipelines::utils::DeviceRequest::Metal(index);
                self
            }
        }
    };
}

pub(crate) use impl_device_methods;
