//! The compiled compute pipeline: a synthesized shader pair, its bind group layouts, and
//! one render pipeline per depth/additive-blend combination. Grounded in `makeCompute` in
//! `original_source/tensor.c`, which links one GL program per compute declaration and caches
//! its uniform locations; here the equivalent "compile once, draw many times with varying
//! state" shape is a `wgpu::RenderPipeline` per toggle combination, since WGPU bakes both
//! depth-test and blend state into pipeline creation rather than exposing `glEnable`/
//! `glDisable` toggles.

use std::collections::HashMap;

use atlas_tensor::Channels;
use atlas_wgpu::Device;

use crate::error::Result;
use crate::shader::{SynthesizedShader, FIRST_ARG_GROUP, OUTPUT_GROUP, VARIABLES_GROUP};

const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

/// Depth buffer format used whenever a compute step runs with depth testing enabled.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A compiled compute step, ready to be drawn by [`crate::execute::execute`].
pub struct Compute {
    pipelines: HashMap<(bool, bool), wgpu::RenderPipeline>,
    variables_layout: wgpu::BindGroupLayout,
    output_layout: wgpu::BindGroupLayout,
    arg_layout: wgpu::BindGroupLayout,
    arg_count: u32,
    ret_count: u32,
    channels: Channels,
    reuse: bool,
}

impl Compute {
    /// Builds the pipeline layout and all four depth/blend pipeline variants up front from
    /// an already-synthesized shader pair, mirroring the original linking one program per
    /// compute declaration once, at compile time, rather than per draw. Synthesis itself
    /// happens once, at compile time, via [`crate::shader::synthesize`] (the compiler calls
    /// it to build each `ComputeDecl`); this just compiles that text into a pipeline.
    pub fn new(device: &Device, synthesized: &SynthesizedShader, reuse: bool) -> Result<Self> {
        let arg_count = synthesized.arg_count;
        let ret_count = synthesized.ret_count;
        let channels = synthesized.channels;

        let vertex_module = device.shader("atlas-compute-vertex", &synthesized.vertex_source);
        let fragment_module = device.shader("atlas-compute-fragment", &synthesized.fragment_source);

        let variables_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas-compute-variables-layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let output_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas-compute-output-layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
        });
        let arg_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas-compute-arg-layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let mut group_layouts: Vec<&wgpu::BindGroupLayout> = vec![&variables_layout, &output_layout];
        for _ in 0..arg_count {
            group_layouts.push(&arg_layout);
        }
        debug_assert_eq!(group_layouts.len() as u32, FIRST_ARG_GROUP + arg_count);
        debug_assert_eq!(VARIABLES_GROUP, 0);
        debug_assert_eq!(OUTPUT_GROUP, 1);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("atlas-compute-pipeline-layout"),
            bind_group_layouts: &group_layouts,
            push_constant_ranges: &[],
        });

        let format = channels.wgpu_format();
        let mut pipelines = HashMap::new();
        for depth in [false, true] {
            for additive in [false, true] {
                let blend = if additive {
                    Some(wgpu::BlendState {
                        color: wgpu::BlendComponent { src_factor: wgpu::BlendFactor::One, dst_factor: wgpu::BlendFactor::One, operation: wgpu::BlendOperation::Add },
                        alpha: wgpu::BlendComponent { src_factor: wgpu::BlendFactor::One, dst_factor: wgpu::BlendFactor::One, operation: wgpu::BlendOperation::Add },
                    })
                } else {
                    None
                };
                let targets: Vec<Option<wgpu::ColorTargetState>> = (0..ret_count)
                    .map(|_| Some(wgpu::ColorTargetState { format, blend, write_mask: wgpu::ColorWrites::ALL }))
                    .collect();
                let depth_stencil = depth.then(|| wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                });
                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("atlas-compute-pipeline"),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &vertex_module,
                        entry_point: VERTEX_ENTRY,
                        buffers: &[],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &fragment_module,
                        entry_point: FRAGMENT_ENTRY,
                        targets: &targets,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState { topology: wgpu::PrimitiveTopology::TriangleList, ..Default::default() },
                    depth_stencil,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                });
                pipelines.insert((depth, additive), pipeline);
            }
        }

        Ok(Self {
            pipelines,
            variables_layout,
            output_layout,
            arg_layout,
            arg_count,
            ret_count,
            channels,
            reuse,
        })
    }

    pub fn arg_count(&self) -> u32 {
        self.arg_count
    }

    pub fn ret_count(&self) -> u32 {
        self.ret_count
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn reuse(&self) -> bool {
        self.reuse
    }

    pub(crate) fn variables_layout(&self) -> &wgpu::BindGroupLayout {
        &self.variables_layout
    }

    pub(crate) fn output_layout(&self) -> &wgpu::BindGroupLayout {
        &self.output_layout
    }

    pub(crate) fn arg_layout(&self) -> &wgpu::BindGroupLayout {
        &self.arg_layout
    }

    /// Looks up the pipeline variant for the given depth-test/additive-blend toggles
    /// (the evaluator's `depth`/`additive` render-state flags at the moment this compute
    /// step runs).
    pub(crate) fn pipeline(&self, depth: bool, additive: bool) -> &wgpu::RenderPipeline {
        &self.pipelines[&(depth, additive)]
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, has_dynamic_offset: false, min_binding_size: None },
        count: None,
    }
}
