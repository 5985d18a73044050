//! Command encoder wrapper. Where the teacher crate's `Encoder` only opens compute passes
//! over storage buffers, this one opens render passes over texture attachments, since every
//! Atlas compute step draws a full-screen quad into one or more output textures.

use tracing::trace;

use crate::{Device, Error, Result};

/// Represents a command encoder in the WGPU backend.
pub struct Encoder {
    encoder: wgpu::CommandEncoder,
}

impl Encoder {
    /// Creates a new `Encoder` instance.
    pub fn new(device: &Device, label: &str) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        trace!("Created command encoder '{label}'");
        Self { encoder }
    }

    /// Begins a render pass over the given color attachments (and optional depth
    /// attachment) and executes the provided callback. `clear` controls whether each color
    /// attachment is cleared to transparent black or loaded, matching the reuse-compute
    /// distinction between drawing fresh output and accumulating into an existing slot.
    pub fn pass<F>(
        mut self,
        label: &str,
        attachments: &[&wgpu::TextureView],
        depth: Option<&wgpu::TextureView>,
        clear: bool,
        call: F,
    ) -> Result<Self>
    where
        F: FnOnce(wgpu::RenderPass) -> anyhow::Result<()>,
    {
        let load = if clear {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = attachments
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                })
            })
            .collect();
        let depth_stencil_attachment = depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: if clear { wgpu::LoadOp::Clear(1.0) } else { wgpu::LoadOp::Load },
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        });
        let render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        trace!("Executing render pass '{label}'");
        call(render_pass).map_err(Error::RenderError)?;
        Ok(self)
    }

    /// Copies one layer of a texture into the same layer of another texture of identical
    /// format and dimensions, used by `take_ownership`'s per-layer GPU-to-GPU duplication.
    pub fn copy_texture_to_texture(&mut self, source: &wgpu::Texture, destination: &wgpu::Texture, layer: u32, width: u32, height: u32) {
        self.encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: source,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: destination,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
    }

    /// Copies one layer of a texture into a buffer, used by the synchronous
    /// `to_host_memory` step and the `transfer_start`/`transfer_end` async readback pair.
    pub fn copy_texture_to_buffer(
        &mut self,
        texture: &wgpu::Texture,
        layer: u32,
        width: u32,
        height: u32,
        bytes_per_row: u32,
        buffer: &wgpu::Buffer,
    ) {
        self.encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
    }

    /// Finishes the command encoding and returns the command buffer.
    pub fn finish(self) -> wgpu::CommandBuffer {
        self.encoder.finish()
    }
}
