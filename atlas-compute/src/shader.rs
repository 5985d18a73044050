//! Synthesizes a WGSL vertex/fragment shader pair from a compute step's four user fragments,
//! grounded in `makeCompute` in `original_source/tensor.c`. Where the original assembles GLSL
//! ES text with `snprintf`, this builds WGSL text with the same structural shape: a
//! pass-through vertex stage drawing two full-screen triangles, and a fragment stage carrying
//! per-argument sampling helpers plus one of two footers (`generic`, four scalars packed per
//! texel; `channeled`, one typed value per fragment).

use crate::error::{Error, Result};
use atlas_tensor::{ChannelKind, Channels};

/// The four user-supplied WGSL fragments a compute step declares, named after the original's
/// `vglslpre`/`vglsl`/`glslpre`/`glsl` parameters to `makeCompute`.
pub struct ComputeFragments<'a> {
    pub vertex_pre: &'a str,
    pub vertex: &'a str,
    pub fragment_pre: &'a str,
    pub fragment_main: &'a str,
}

/// Declares the program variable block as a `@group(0) @binding(0) var<uniform>` binding.
/// Built by the compiler from the variable layout it collected (the original passes the
/// analogous `uniforms` GLSL text into `makeCompute` as an opaque, already-assembled string);
/// `atlas-compute` never inspects variable names or offsets itself.
pub const VARIABLES_GROUP: u32 = 0;
pub(crate) const OUTPUT_GROUP: u32 = 1;
pub(crate) const FIRST_ARG_GROUP: u32 = 2;

/// A synthesized shader pair ready for `wgpu::Device::create_shader_module`, plus the
/// argument/return counts and channel format needed to build the pipeline around it.
pub struct SynthesizedShader {
    pub vertex_source: String,
    pub fragment_source: String,
    pub arg_count: u32,
    pub ret_count: u32,
    pub channels: Channels,
}

const ARG_LETTERS: [char; 6] = ['a', 'b', 'c', 'd', 'e', 'f'];

/// Builds the vertex/fragment WGSL source for a compute step. Mirrors `makeCompute`'s
/// template assembly: a shared block of per-argument uniform declarations and sampling
/// helpers, the output uniforms, the user's `*_pre` declarations, and a footer that differs
/// for generic (channels == 0) versus channeled output.
pub fn synthesize(
    fragments: &ComputeFragments,
    uniforms: &str,
    arg_count: u32,
    ret_count: u32,
    channels: Channels,
) -> Result<SynthesizedShader> {
    if arg_count as usize > ARG_LETTERS.len() {
        return Err(Error::TooManyArguments);
    }
    if ret_count == 0 || ret_count > 4 {
        return Err(Error::BadReturnCount);
    }

    let arg_bindings = arg_binding_declarations(arg_count);
    let arg_helpers = arg_sampling_helpers(arg_count);

    let vertex_source = format!(
        "{uniforms}\n{arg_bindings}\n\
         struct VertexOutput {{\n\
         \x20   @builtin(position) position: vec4<f32>,\n\
         }}\n\
         \n\
         const CORNERS: array<vec4<f32>, 6> = array<vec4<f32>, 6>(\n\
         \x20   vec4<f32>(-1.0, -1.0, 1.0, 1.0),\n\
         \x20   vec4<f32>( 1.0, -1.0, 1.0, 1.0),\n\
         \x20   vec4<f32>(-1.0,  1.0, 1.0, 1.0),\n\
         \x20   vec4<f32>(-1.0,  1.0, 1.0, 1.0),\n\
         \x20   vec4<f32>( 1.0, -1.0, 1.0, 1.0),\n\
         \x20   vec4<f32>( 1.0,  1.0, 1.0, 1.0),\n\
         );\n\
         \n\
         {vertex_pre}\n\
         \n\
         @vertex\n\
         fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {{\n\
         \x20   let i = i32(vertex_index);\n\
         \x20   let ifloat = f32(i) + 0.5;\n\
         \x20   var ret: vec4<f32>;\n\
         \x20   {vertex_body}\n\
         \x20   var out: VertexOutput;\n\
         \x20   out.position = ret;\n\
         \x20   return out;\n\
         }}\n",
        arg_bindings = arg_bindings,
        vertex_pre = fragments.vertex_pre,
        vertex_body = non_empty_or(fragments.vertex, "ret = CORNERS[vertex_index];"),
    );

    let output_decl = format!(
        "struct OutputUniform {{\n    strides: vec4<i32>,\n    dims: vec2<i32>,\n    _pad: vec2<i32>,\n}}\n\
         @group({group}) @binding(0) var<uniform> output_uniform: OutputUniform;\n\n\
         fn to_tensor_indices(flat: i32) -> vec4<i32> {{\n\
         \x20   var i = flat;\n\
         \x20   var ret: vec4<i32>;\n\
         \x20   ret.x = i / output_uniform.strides.x; i -= ret.x * output_uniform.strides.x;\n\
         \x20   ret.y = i / output_uniform.strides.y; i -= ret.y * output_uniform.strides.y;\n\
         \x20   ret.z = i / output_uniform.strides.z; i -= ret.z * output_uniform.strides.z;\n\
         \x20   ret.w = i;\n\
         \x20   return ret;\n\
         }}\n",
        group = OUTPUT_GROUP,
    );

    let footer = if channels == Channels::Generic {
        generic_footer(fragments.fragment_main, ret_count)
    } else {
        channeled_footer(fragments.fragment_main, ret_count, channels)
    };

    let fragment_source = format!(
        "{uniforms}\n{arg_bindings}\n{arg_helpers}\n{output_decl}\n{fragment_pre}\n\n{footer}",
        arg_bindings = arg_bindings,
        arg_helpers = arg_helpers,
        output_decl = output_decl,
        fragment_pre = fragments.fragment_pre,
        footer = footer,
    );

    Ok(SynthesizedShader {
        vertex_source,
        fragment_source,
        arg_count,
        ret_count,
        channels,
    })
}

fn non_empty_or<'a>(s: &'a str, default: &'a str) -> &'a str {
    if s.trim().is_empty() {
        default
    } else {
        s
    }
}

fn arg_binding_declarations(arg_count: u32) -> String {
    let mut out = String::new();
    for i in 0..arg_count as usize {
        let letter = ARG_LETTERS[i];
        let group = FIRST_ARG_GROUP + i as u32;
        out.push_str(&format!(
            "struct Arg{letter}Uniform {{\n    strides: vec4<i32>,\n    dims: vec2<i32>,\n    toffset: i32,\n    _pad: i32,\n}}\n\
             @group({group}) @binding(0) var<uniform> arg_{letter}_uniform: Arg{letter}Uniform;\n\
             @group({group}) @binding(1) var arg_{letter}_tex: texture_2d_array<f32>;\n\
             @group({group}) @binding(2) var arg_{letter}_samp: sampler;\n\n",
            letter = letter,
            group = group,
        ));
    }
    out
}

/// `x(i: vec4<i32>) -> f32` loads one logical element by index (accounting for the RGBA32F
/// packing); `xf(uv, layer, level)` samples the texture directly. Mirrors `texFunctions` in
/// `makeCompute`.
fn arg_sampling_helpers(arg_count: u32) -> String {
    let mut out = String::new();
    for i in 0..arg_count as usize {
        let letter = ARG_LETTERS[i];
        out.push_str(&format!(
            "fn {letter}(i: vec4<i32>) -> f32 {{\n\
             \x20   let dims = vec2<f32>(arg_{letter}_uniform.dims);\n\
             \x20   var lindex = arg_{letter}_uniform.toffset;\n\
             \x20   lindex += arg_{letter}_uniform.strides.x * i.x;\n\
             \x20   lindex += arg_{letter}_uniform.strides.y * i.y;\n\
             \x20   lindex += arg_{letter}_uniform.strides.z * i.z;\n\
             \x20   lindex += arg_{letter}_uniform.strides.w * i.w;\n\
             \x20   let pixel_index = lindex / 4;\n\
             \x20   let channel = lindex % 4;\n\
             \x20   let uv = (vec2<f32>(f32(pixel_index % arg_{letter}_uniform.dims.x), f32(pixel_index / arg_{letter}_uniform.dims.x)) + 0.5) / dims;\n\
             \x20   let texel = textureSampleLevel(arg_{letter}_tex, arg_{letter}_samp, uv, 0, 0.0);\n\
             \x20   return texel[channel];\n\
             }}\n\
             fn {letter}f(uv: vec2<f32>, layer: i32, level: f32) -> vec4<f32> {{\n\
             \x20   return textureSampleLevel(arg_{letter}_tex, arg_{letter}_samp, uv / vec2<f32>(arg_{letter}_uniform.dims), layer, level);\n\
             }}\n\n",
            letter = letter,
        ));
    }
    out
}

/// Evaluates the user body four times per fragment, once per RGBA component, binding `i`,
/// `ifloat`, `t`, `tf` to the logical index being computed and packing the four scalars per
/// return into `_a_fragColor`. Mirrors `tensorFooterTemplate`.
fn generic_footer(body: &str, ret_count: u32) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "struct FragmentOutput {{\n{targets}}}\n\n@fragment\nfn fs_main(@builtin(position) frag_coord: vec4<f32>) -> FragmentOutput {{\n",
        targets = (0..ret_count).map(|i| format!("    @location({i}) ret{i}: vec4<f32>,\n")).collect::<String>(),
    ));
    out.push_str(
        "    let base = (i32(frag_coord.x) + i32(frag_coord.y) * output_uniform.dims.x) * 4;\n    var out: FragmentOutput;\n",
    );
    for (channel, field) in ["r", "g", "b", "a"].iter().enumerate() {
        out.push_str("    {\n");
        out.push_str(&format!(
            "        let i = base + {channel};\n        let ifloat = f32(i) + 0.5;\n        let t = to_tensor_indices(i);\n        let tf = vec4<f32>(t) + 0.5;\n        var ret: array<f32, {ret_count}>;\n        {{\n            {body}\n        }}\n",
        ));
        for ret in 0..ret_count {
            out.push_str(&format!("        out.ret{ret}.{field} = ret[{ret}];\n", ret = ret, field = field));
        }
        out.push_str("    }\n");
    }
    out.push_str("    return out;\n}\n");
    out
}

/// Evaluates the user body once per fragment, typed according to the channel format, with
/// `tf == frag_coord.xy`. Mirrors `textureFooterTemplate`.
fn channeled_footer(body: &str, ret_count: u32, channels: Channels) -> String {
    let scalar = channeled_scalar_type(channels);
    let mut out = String::new();
    out.push_str(&format!(
        "struct FragmentOutput {{\n{targets}}}\n\n@fragment\nfn fs_main(@builtin(position) frag_coord: vec4<f32>) -> FragmentOutput {{\n\
         \x20   var ret: array<{scalar}, {ret_count}>;\n\
         \x20   let tf = frag_coord.xy;\n\
         \x20   let ifloat = floor(tf.y) * f32(output_uniform.dims.x) + floor(tf.x) + 0.5;\n\
         \x20   let i = i32(ifloat);\n\
         \x20   {{\n\
         \x20       {body}\n\
         \x20   }}\n\
         \x20   var out: FragmentOutput;\n",
        targets = (0..ret_count).map(|i| format!("    @location({i}) ret{i}: {scalar},\n")).collect::<String>(),
        scalar = scalar,
        ret_count = ret_count,
        body = body,
    ));
    for ret in 0..ret_count {
        out.push_str(&format!("    out.ret{ret} = ret[{ret}];\n", ret = ret));
    }
    out.push_str("    return out;\n}\n");
    out
}

fn channeled_scalar_type(channels: Channels) -> &'static str {
    match channels {
        Channels::Generic => "vec4<f32>",
        Channels::Explicit { count: 1, .. } => "f32",
        Channels::Explicit { count: 2, .. } => "vec2<f32>",
        Channels::Explicit { count: 3, .. } | Channels::Explicit { count: 4, .. } => "vec4<f32>",
        Channels::Explicit { count, .. } => panic!("unsupported channel count {count}"),
    }
}

/// Whether a channel format's texel type needs quantization handling at readback, forwarded
/// for callers building the reverse (host-side) path. Kept here rather than re-exported from
/// `atlas-tensor` so compute-specific call sites read `shader::is_quantized`.
pub fn is_quantized(channels: Channels) -> bool {
    matches!(channels, Channels::Explicit { kind: ChannelKind::U8, .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fragments() -> ComputeFragments<'static> {
        ComputeFragments {
            vertex_pre: "",
            vertex: "",
            fragment_pre: "",
            fragment_main: "ret[0] = a(t);",
        }
    }

    #[test]
    fn synthesizes_generic_footer_for_channel_zero() {
        let shader = synthesize(&fragments(), "", 1, 1, Channels::Generic).unwrap();
        assert!(shader.fragment_source.contains("to_tensor_indices"));
        assert!(shader.fragment_source.contains("out.ret0.r = ret[0];"));
        assert!(shader.vertex_source.contains("CORNERS[vertex_index]"));
    }

    #[test]
    fn synthesizes_channeled_footer_for_explicit_channels() {
        let channels = Channels::Explicit { count: 4, kind: ChannelKind::F32 };
        let shader = synthesize(&fragments(), "", 1, 1, channels).unwrap();
        assert!(shader.fragment_source.contains("frag_coord.xy"));
        assert!(!shader.fragment_source.contains("to_tensor_indices(i)"));
    }

    #[test]
    fn rejects_too_many_arguments() {
        let err = synthesize(&fragments(), "", 7, 1, Channels::Generic).unwrap_err();
        assert!(matches!(err, Error::TooManyArguments));
    }

    #[test]
    fn rejects_bad_return_count() {
        let err = synthesize(&fragments(), "", 1, 0, Channels::Generic).unwrap_err();
        assert!(matches!(err, Error::BadReturnCount));
    }
}
