//! Render pipeline and bind group construction. The teacher crate's `LayoutBuilder` only
//! binds storage buffers for compute pipelines; this one binds textures, samplers, and
//! uniform buffers for render pipelines, since a compute step's shader pair samples its
//! input tensors as textures and writes its output by rasterizing into one.

use std::ops::Deref;

use crate::Device;

const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

/// A resource bound into a render pipeline's single bind group.
pub enum Binding<'a> {
    Texture(&'a wgpu::TextureView),
    Sampler(&'a wgpu::Sampler),
    Uniform(&'a wgpu::Buffer),
}

/// Represents a render pipeline in the WGPU backend, encapsulating the pipeline itself and
/// the bind group it draws with.
pub struct Pipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
}

impl Pipeline {
    pub fn new(pipeline: wgpu::RenderPipeline, bind_group: wgpu::BindGroup) -> Self {
        Self { pipeline, bind_group }
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

impl Deref for Pipeline {
    type Target = wgpu::RenderPipeline;

    fn deref(&self) -> &Self::Target {
        &self.pipeline
    }
}

/// Builder for creating a bind group layout and its bind group, one entry at a time.
pub struct LayoutBuilder<'a, 'device> {
    device: &'device Device,
    layout_entries: Vec<wgpu::BindGroupLayoutEntry>,
    bind_entries: Vec<wgpu::BindGroupEntry<'a>>,
    counter: u32,
}

impl<'a, 'device> LayoutBuilder<'a, 'device> {
    pub fn new(device: &'device Device) -> Self {
        Self {
            device,
            layout_entries: Vec::new(),
            bind_entries: Vec::new(),
            counter: 0,
        }
    }

    /// Adds a sampled texture entry, visible to the fragment stage.
    pub fn add_texture(mut self, view: &'a wgpu::TextureView) -> Self {
        let binding = self.counter;
        self.layout_entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2Array,
                multisampled: false,
            },
            count: None,
        });
        self.bind_entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::TextureView(view),
        });
        self.counter += 1;
        self
    }

    /// Adds a sampler entry, visible to the fragment stage.
    pub fn add_sampler(mut self, sampler: &'a wgpu::Sampler) -> Self {
        let binding = self.counter;
        self.layout_entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        self.bind_entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
        self.counter += 1;
        self
    }

    /// Adds a uniform buffer entry, visible to both the vertex and fragment stages (cached
    /// uniform locations such as the tensor's shape and channel code are read by both).
    pub fn add_uniform(mut self, buffer: &'a wgpu::Buffer) -> Self {
        let binding = self.counter;
        self.layout_entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        self.bind_entries.push(wgpu::BindGroupEntry {
            binding,
            resource: buffer.as_entire_binding(),
        });
        self.counter += 1;
        self
    }

    pub fn add_entry(self, binding: Binding<'a>) -> Self {
        match binding {
            Binding::Texture(view) => self.add_texture(view),
            Binding::Sampler(sampler) => self.add_sampler(sampler),
            Binding::Uniform(buffer) => self.add_uniform(buffer),
        }
    }

    pub fn add_entries(mut self, bindings: impl IntoIterator<Item = Binding<'a>>) -> Self {
        for binding in bindings {
            self = self.add_entry(binding);
        }
        self
    }

    /// Finalizes the layout and bind group, returning a `PipelineBuilder`.
    pub fn pipeline(self, label: &str) -> PipelineBuilder<'device> {
        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &self.layout_entries,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &bind_group_layout,
            entries: &self.bind_entries,
        });
        PipelineBuilder::new(self.device, bind_group, bind_group_layout)
    }
}

/// Builder for creating and configuring a render pipeline.
pub struct PipelineBuilder<'device> {
    device: &'device Device,
    label: Option<String>,
    layout: wgpu::PipelineLayout,
    bind_group: wgpu::BindGroup,
    blend: Option<wgpu::BlendState>,
    depth_format: Option<wgpu::TextureFormat>,
    topology: wgpu::PrimitiveTopology,
}

impl<'device> PipelineBuilder<'device> {
    pub fn new(device: &'device Device, bind_group: wgpu::BindGroup, bind_group_layout: wgpu::BindGroupLayout) -> Self {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        Self {
            device,
            label: None,
            layout: pipeline_layout,
            bind_group,
            blend: None,
            depth_format: None,
            topology: wgpu::PrimitiveTopology::TriangleStrip,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Enables alpha blending for the draw step (the `blend` step's on/off toggle).
    pub fn with_blend(mut self, blend: wgpu::BlendState) -> Self {
        self.blend = Some(blend);
        self
    }

    /// Attaches a depth buffer with depth testing enabled (the `depth` step's toggle).
    pub fn with_depth(mut self, format: wgpu::TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    pub fn with_topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Builds the render pipeline from a vertex/fragment shader pair, one color target per
    /// output tensor texture.
    pub fn build(self, vertex: &wgpu::ShaderModule, fragment: &wgpu::ShaderModule, targets: &[wgpu::TextureFormat]) -> Pipeline {
        let color_targets: Vec<Option<wgpu::ColorTargetState>> = targets
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend: self.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();
        let depth_stencil = self.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: self.label.as_deref(),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: VERTEX_ENTRY,
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: FRAGMENT_ENTRY,
                targets: &color_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: self.topology,
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        Pipeline::new(pipeline, self.bind_group)
    }
}
