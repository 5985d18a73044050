//! Entry point for creating a WGPU instance, mirroring the teacher crate's `WGPU` struct but
//! scoped to Atlas's offscreen, texture-target use: there is no windowing surface here
//! (presenting to a window is an out-of-scope external stage per the core specification).

use bon::bon;

use crate::adapter::AdapterBuilder;
use crate::{Device, Result};

/// Entry point for creating GPU instances and adapters.
pub struct WGPU {
    instance: wgpu::Instance,
}

#[bon]
impl WGPU {
    /// Creates a new `WGPU` instance restricted to the given backends.
    #[builder]
    pub fn new(backends: wgpu::Backends) -> WGPU {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        WGPU { instance }
    }

    /// Creates an `AdapterBuilder` for requesting a GPU adapter.
    pub fn adapter(self) -> AdapterBuilder {
        AdapterBuilder::new(self.instance)
    }

    /// Requests a device on the primary backend with default limits, the common case for
    /// headless compute-step execution.
    pub async fn default_context() -> Result<Device> {
        let instance = Self::builder().backends(wgpu::Backends::PRIMARY).build();
        instance.adapter().request().await?.device().request().await
    }
}
