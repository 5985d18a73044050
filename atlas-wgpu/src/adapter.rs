//! GPU adapter discovery, mirroring `tengu-wgpu::adapter` minus surface compatibility —
//! Atlas never requests an adapter compatible with a presentation surface.

use std::ops::Deref;

use tracing::trace;

use crate::device::DeviceBuilder;
use crate::Error;

/// Represents a GPU adapter.
pub struct Adapter {
    adapter: wgpu::Adapter,
}

impl Adapter {
    pub fn new(adapter: wgpu::Adapter) -> Self {
        Self { adapter }
    }

    /// Creates a `DeviceBuilder` from this adapter.
    pub fn device(self) -> DeviceBuilder {
        DeviceBuilder::new(self.adapter)
    }
}

impl Deref for Adapter {
    type Target = wgpu::Adapter;
    fn deref(&self) -> &Self::Target {
        &self.adapter
    }
}

/// Builder for requesting an adapter from an instance.
pub struct AdapterBuilder {
    instance: wgpu::Instance,
}

impl AdapterBuilder {
    pub fn new(instance: wgpu::Instance) -> Self {
        Self { instance }
    }

    /// Requests an adapter asynchronously.
    pub async fn request(self) -> Result<Adapter, Error> {
        let adapter = self
            .instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok_or(Error::CreateAdapterError)?;
        trace!("Requested new adapter");
        Ok(Adapter::new(adapter))
    }
}
