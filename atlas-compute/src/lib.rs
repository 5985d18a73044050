//! Compute-step shader synthesis and execution. Given a compute step's four user WGSL
//! fragments and metadata (argument count, return count, channel format, reuse flag),
//! synthesizes a vertex/fragment shader pair, compiles it into a render pipeline, and at run
//! time binds its input tensors as sampled textures and draws a full-screen quad (or a
//! caller-declared vertex count) into its output tensors.
//!
//! Grounded in `makeCompute`/`newTensorsInitialized` in `original_source/tensor.c`, built on
//! `atlas-wgpu` for device/texture plumbing and `atlas-tensor` for the tensor stack.
//!
//! ## Modules
//!
//! - `shader`: WGSL shader-pair synthesis from a compute step's declaration.
//! - `compute`: the compiled `Compute` pipeline (layouts, depth/blend pipeline variants).
//! - `execute`: `newTensorsInitialized`'s execution algorithm.
//! - `error`: error and result types shared across the crate.

mod compute;
mod error;
mod execute;
mod shader;

pub use compute::{Compute, DEPTH_FORMAT};
pub use error::{Error, Result};
pub use execute::{execute, RenderState};
pub use shader::{is_quantized, synthesize, ComputeFragments, SynthesizedShader, VARIABLES_GROUP};
