//! GPU device wrapper: shader module creation, texture/sampler allocation, and the entry
//! points for building render pipelines and bind group layouts. Mirrors the shape of
//! `tengu-wgpu::device` but generalized from compute-buffer binding to texture binding,
//! since Atlas's compute steps read/write tensors backed by textures, not storage buffers.

use std::ops::Deref;

use crate::encoder::Encoder;
use crate::pipeline::LayoutBuilder;
use crate::texture::TextureBuilder;
use crate::{Error, Result};

/// Represents a WGPU device and its associated queue.
pub struct Device {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Device {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Device {
        Self { device, queue }
    }

    /// Creates a new command encoder with the given label.
    pub fn encoder(&self, label: &str) -> Encoder {
        Encoder::new(self, label)
    }

    /// Creates a shader module from WGSL source code.
    pub fn shader(&self, label: &str, source: &str) -> wgpu::ShaderModule {
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    }

    /// Creates a texture builder for allocating a render-target/sampled texture.
    pub fn texture(&self, format: wgpu::TextureFormat) -> TextureBuilder {
        TextureBuilder::new(self, format)
    }

    /// Creates a sampler with the given filter mode and mirrored-repeat wrapping, used by
    /// the `texture` step for mipmapped, anisotropically filtered sampling.
    pub fn sampler(&self, label: &str, filter: wgpu::FilterMode, mipmapped: bool) -> wgpu::Sampler {
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::MirrorRepeat,
            address_mode_v: wgpu::AddressMode::MirrorRepeat,
            address_mode_w: wgpu::AddressMode::MirrorRepeat,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: if mipmapped { wgpu::FilterMode::Linear } else { wgpu::FilterMode::Nearest },
            anisotropy_clamp: if mipmapped { 16 } else { 1 },
            ..Default::default()
        })
    }

    /// Submits a command buffer to the queue for execution.
    pub fn submit(&self, commands: wgpu::CommandBuffer) {
        self.queue.submit(std::iter::once(commands));
    }

    /// Writes `data` into `texture`'s given layer/mip using the queue.
    pub fn write_texture(&self, texture: &wgpu::Texture, layer: u32, data: &[u8], bytes_per_row: u32, width: u32, height: u32) {
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
    }

    /// Writes `data` into `buffer` at `offset` using the queue, the buffer analogue of
    /// [`Device::write_texture`]; used to push an updated program-variable uniform block to
    /// the GPU immediately after a `set` step, mirroring the original's eager `glUniform*fv`
    /// calls.
    pub fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    /// Creates a layout builder for configuring bind group layouts and render pipelines.
    pub fn layout(&self) -> LayoutBuilder {
        LayoutBuilder::new(self)
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }
}

impl Deref for Device {
    type Target = wgpu::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

/// Builder for requesting and configuring a `Device` from an adapter.
pub struct DeviceBuilder {
    adapter: wgpu::Adapter,
    features: wgpu::Features,
    limits: wgpu::Limits,
}

impl DeviceBuilder {
    pub fn new(adapter: wgpu::Adapter) -> Self {
        Self {
            adapter,
            features: wgpu::Features::empty(),
            limits: wgpu::Limits::default(),
        }
    }

    pub fn with_features(mut self, features: wgpu::Features) -> Self {
        self.features |= features;
        self
    }

    pub fn with_limits(mut self, limits: wgpu::Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Requests the device asynchronously.
    pub async fn request(self) -> Result<Device> {
        let (device, queue) = self
            .adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: self.features,
                    required_limits: self.limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(Error::RequestDeviceError)?;
        Ok(Device::new(device, queue))
    }
}
