//! GPU texture allocation. Atlas tensors that live on the GPU are backed by 2D-array
//! textures (generic packed tensors use a single layer; channeled tensors may request
//! several). This module is the texture analogue of `tengu-wgpu::buffer`'s `BufferBuilder`.

use crate::Device;

/// A GPU texture together with the metadata needed to build attachment/sampling views.
pub struct Texture {
    texture: wgpu::Texture,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    layers: u32,
    mip_level_count: u32,
}

impl Texture {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// A view over a single array layer, suitable for use as a render pass color
    /// attachment.
    pub fn layer_view(&self, layer: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("atlas-texture-layer-view"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: layer,
            array_layer_count: Some(1),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        })
    }

    /// A view over the whole array, suitable for sampling from a shader as
    /// `texture_2d_array`.
    pub fn sample_view(&self) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("atlas-texture-sample-view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        })
    }

    pub fn generate_mipmaps(&self) -> bool {
        self.mip_level_count > 1
    }
}

/// Builder for allocating a GPU texture.
pub struct TextureBuilder<'device> {
    device: &'device Device,
    format: wgpu::TextureFormat,
    mipmapped: bool,
}

impl<'device> TextureBuilder<'device> {
    pub fn new(device: &'device Device, format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            format,
            mipmapped: false,
        }
    }

    pub fn with_mipmaps(mut self, mipmapped: bool) -> Self {
        self.mipmapped = mipmapped;
        self
    }

    /// Allocates an uninitialized `width` x `height` x `layers` texture usable both as a
    /// render attachment (for compute-step output) and as a sampled texture (for
    /// compute-step input and the `texture` step).
    pub fn empty(self, width: u32, height: u32, layers: u32) -> Texture {
        let mip_level_count = if self.mipmapped { mip_levels(width, height) } else { 1 };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas-tensor-texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Texture {
            texture,
            format: self.format,
            width,
            height,
            layers,
            mip_level_count,
        }
    }
}

fn mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_level_count_matches_largest_dimension() {
        assert_eq!(mip_levels(1, 1), 1);
        assert_eq!(mip_levels(256, 4), 9);
        assert_eq!(mip_levels(4, 256), 9);
    }
}
