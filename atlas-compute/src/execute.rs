//! `newTensorsInitialized`: validates the stack, allocates or reuses output textures, binds
//! the program-variable block plus every argument's texture/sampler/uniform, draws the
//! quad (or a caller-declared vertex count), and pops/pushes the tensor stack. Grounded in
//! `newTensorsInitialized` in `original_source/tensor.c` and the pre-validation its one call
//! site performs in `program.c`'s `COMPUTE` step (popping the shape and vertex-count scalars
//! off the stack before invoking it).

use wgpu::util::DeviceExt;

use atlas_tensor::{Channels, Storage, Tensor, TensorStack};
use atlas_wgpu::Device;

use crate::compute::{Compute, DEPTH_FORMAT};
use crate::error::{Error, Result};
use crate::shader::{FIRST_ARG_GROUP, OUTPUT_GROUP, VARIABLES_GROUP};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct OutputUniform {
    strides: [i32; 4],
    dims: [i32; 2],
    _pad: [i32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ArgUniform {
    strides: [i32; 4],
    dims: [i32; 2],
    toffset: i32,
    _pad: i32,
}

/// The evaluator's global render-state flags that a compute step reads at draw time.
/// `backface` culling is baked into the pipeline's fixed `PrimitiveState` rather than
/// threaded through per draw, since every compute step draws the same two-triangle quad.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderState {
    pub depth: bool,
    pub additive: bool,
}

/// Runs one compute step: the Rust-side counterpart of `newTensorsInitialized`.
///
/// `variables` is the program's variable-block uniform buffer, built and kept up to date by
/// the compiler/evaluator; this function only binds it, it never inspects its layout.
pub fn execute(compute: &Compute, device: &Device, stack: &mut TensorStack, variables: &wgpu::Buffer, state: RenderState) -> Result<()> {
    let arg_count = compute.arg_count() as usize;
    let ret_count = compute.ret_count() as usize;

    // The shape and vertex-count scalars sit on top of the stack, above the compute's own
    // arguments (and, if reusing, its existing return slots).
    if stack.len() < 2 {
        return Err(Error::StackTooShallow { arg_count: compute.arg_count(), ret_count: compute.ret_count(), stack_size: stack.len() });
    }

    let shape_tensor = stack.pop()?;
    if shape_tensor.rank() != 1 || shape_tensor.size() > 4 {
        return Err(Error::ShapeNotRank1);
    }
    let shape_tensor = shape_tensor.to_host_memory(device)?;
    let rank = shape_tensor.size() as usize;
    let mut shape = [1u32; 4];
    for (i, slot) in shape.iter_mut().enumerate().take(rank) {
        *slot = shape_tensor.get(&[i as i64])? as u32;
    }

    let vert_tensor = stack.pop()?;
    if vert_tensor.rank() != 0 {
        return Err(Error::VertexCountNotScalar);
    }
    let vert_tensor = vert_tensor.to_host_memory(device)?;
    let vert_count = vert_tensor.get(&[])? as u32;

    let required = arg_count + if compute.reuse() { ret_count } else { 0 };
    if stack.len() < required {
        return Err(Error::StackTooShallow { arg_count: compute.arg_count(), ret_count: compute.ret_count(), stack_size: stack.len() });
    }

    let channels = compute.channels();
    let (width, height) = match channels {
        Channels::Explicit { count, .. } => {
            if rank != 3 {
                return Err(Error::ReuseNotRank3(rank));
            }
            if shape[2] != count {
                return Err(Error::ReuseChannelMismatch(shape[2]));
            }
            (shape[0], shape[1])
        }
        Channels::Generic => generic_packed_dims(shape[..rank].iter().product::<u32>()),
    };

    // Every argument must be resident on GPU; a view never moves in place so we keep the
    // promoted tensor alongside, without touching the stack slot until the final pop.
    let mut args = Vec::with_capacity(arg_count);
    for i in 0..arg_count {
        let index = stack.len() - 1 - i;
        let tensor = stack.get(index)?;
        args.push(tensor.to_gpu_memory(device)?);
    }

    // Resolve each return: reuse the existing stack slot, pull a matching texture from the
    // cache, or allocate fresh.
    let mut rets = Vec::with_capacity(ret_count);
    for reti in 0..ret_count {
        if compute.reuse() {
            let index = (stack.len() - 1 - arg_count) - reti;
            let existing = stack.get(index)?;
            if !existing.owns_data() {
                return Err(Error::InvalidReuseTarget("attempt to return on top of a non-owning tensor"));
            }
            let gpu = match existing.storage() {
                Storage::Gpu(gpu) => gpu,
                _ => return Err(Error::InvalidReuseTarget("attempt to return on top of a non-GPU tensor")),
            };
            if gpu.channels != channels {
                return Err(Error::InvalidReuseTarget("attempt to return on top of a tensor with the wrong channel format"));
            }
            if gpu.texture.width() != width || gpu.texture.height() != height {
                return Err(Error::InvalidReuseTarget("attempt to return on top of a tensor of the wrong size"));
            }
            rets.push(existing.view());
        } else if let Some(texture) = stack.take_cached_texture(width, height, 1, channels) {
            rets.push(Tensor::from_gpu(&shape[..rank], texture, channels, false));
        } else {
            let texture = device.texture(channels.wgpu_format()).empty(width, height, 1);
            rets.push(Tensor::from_gpu(&shape[..rank], texture, channels, false));
        }
    }

    let variables_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("atlas-compute-variables-bind-group"),
        layout: compute.variables_layout(),
        entries: &[wgpu::BindGroupEntry { binding: 0, resource: variables.as_entire_binding() }],
    });

    let first_ret_strides = rets[0].strides_padded();
    let output_uniform = OutputUniform {
        strides: [first_ret_strides[0] as i32, first_ret_strides[1] as i32, first_ret_strides[2] as i32, first_ret_strides[3] as i32],
        dims: [width as i32, height as i32],
        _pad: [0, 0],
    };
    let output_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("atlas-compute-output-uniform"),
        contents: bytemuck::bytes_of(&output_uniform),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let output_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("atlas-compute-output-bind-group"),
        layout: compute.output_layout(),
        entries: &[wgpu::BindGroupEntry { binding: 0, resource: output_buffer.as_entire_binding() }],
    });

    let mut arg_bind_groups = Vec::with_capacity(arg_count);
    let mut arg_samplers = Vec::with_capacity(arg_count);
    let mut arg_buffers = Vec::with_capacity(arg_count);
    for tensor in &args {
        let gpu = match tensor.storage() {
            Storage::Gpu(gpu) => gpu,
            _ => unreachable!("to_gpu_memory guarantees GPU storage"),
        };
        let strides = tensor.strides_padded();
        let uniform = ArgUniform {
            strides: [strides[0] as i32, strides[1] as i32, strides[2] as i32, strides[3] as i32],
            dims: [gpu.texture.width() as i32, gpu.texture.height() as i32],
            toffset: tensor.offset() as i32,
            _pad: 0,
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("atlas-compute-arg-uniform"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let filter = if gpu.mipmapped { wgpu::FilterMode::Linear } else { wgpu::FilterMode::Nearest };
        let sampler = device.sampler("atlas-compute-arg-sampler", filter, gpu.mipmapped);
        arg_buffers.push(buffer);
        arg_samplers.push(sampler);
    }
    for (i, tensor) in args.iter().enumerate() {
        let gpu = match tensor.storage() {
            Storage::Gpu(gpu) => gpu,
            _ => unreachable!("to_gpu_memory guarantees GPU storage"),
        };
        let view = gpu.texture.sample_view();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas-compute-arg-bind-group"),
            layout: compute.arg_layout(),
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: arg_buffers[i].as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&arg_samplers[i]) },
            ],
        });
        arg_bind_groups.push(bind_group);
    }

    let ret_views: Vec<wgpu::TextureView> = rets
        .iter()
        .map(|ret| match ret.storage() {
            Storage::Gpu(gpu) => gpu.texture.layer_view(0),
            _ => unreachable!("returns are always allocated on GPU"),
        })
        .collect();
    let attachment_refs: Vec<&wgpu::TextureView> = ret_views.iter().collect();

    let depth_texture = state.depth.then(|| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas-compute-depth"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    });
    let depth_view = depth_texture.as_ref().map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));

    let clear = !compute.reuse();
    let pipeline = compute.pipeline(state.depth, state.additive);
    let mut encoder = device.encoder("atlas-compute-execute");
    encoder = encoder.pass("atlas-compute-pass", &attachment_refs, depth_view.as_ref(), clear, |mut pass| {
        pass.set_pipeline(pipeline);
        pass.set_bind_group(VARIABLES_GROUP, &variables_bind_group, &[]);
        pass.set_bind_group(OUTPUT_GROUP, &output_bind_group, &[]);
        for (i, bind_group) in arg_bind_groups.iter().enumerate() {
            pass.set_bind_group(FIRST_ARG_GROUP + i as u32, bind_group, &[]);
        }
        pass.draw(0..vert_count, 0..1);
        Ok(())
    })?;
    device.submit(encoder.finish());

    for _ in 0..arg_count {
        stack.pop_and_recycle()?;
    }
    if !compute.reuse() {
        for ret in rets.into_iter().rev() {
            stack.push(ret);
        }
    }

    Ok(())
}

/// Smallest-square packed dimensions for a generic (RGBA32F) output of `size` logical
/// elements: `ceil(sqrt(ceil(size/4)))` wide, just tall enough to fit the rest. Mirrors the
/// width/height computation in `newTensorsInitialized`.
fn generic_packed_dims(size: u32) -> (u32, u32) {
    let size = size.max(1);
    let texels = (size + 3) / 4;
    let width = ((texels as f64).sqrt().ceil() as u32).max(1);
    let height = ((texels + width - 1) / width).max(1);
    (width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn packs_generic_output_into_smallest_square() {
        assert_eq!(generic_packed_dims(1), (1, 1));
        assert_eq!(generic_packed_dims(4), (1, 1));
        assert_eq!(generic_packed_dims(16), (2, 2));
        assert_eq!(generic_packed_dims(100), (5, 5));
    }

    #[test]
    fn packs_zero_size_output_as_a_single_texel() {
        assert_eq!(generic_packed_dims(0), (1, 1));
    }

    #[test]
    fn render_state_defaults_to_no_depth_or_blending() {
        let state = RenderState::default();
        assert!(!state.depth);
        assert!(!state.additive);
    }

    // GPU-dependent paths (argument binding, output allocation, the render pass itself) need
    // a real adapter and are exercised by `atlas`'s end-to-end tests instead; there is no
    // software adapter available in CI.
}
