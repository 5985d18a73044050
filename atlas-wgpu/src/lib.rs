//! Thin, ergonomic wrapper over `wgpu`, scoped to Atlas's offscreen texture-compute use.
//!
//! Where the general-purpose `wgpu` API exposes every knob for every use case, this crate
//! narrows it to the one thing Atlas needs: allocate array-backed textures, synthesize a
//! vertex/fragment shader pair from a compute step, bind its input tensors as sampled
//! textures, and draw a full-screen quad into its output tensors.
//!
//! ## Modules
//!
//! - `adapter`: GPU adapter discovery.
//! - `device`: Device/queue wrapper: shader modules, texture allocation, samplers, submission.
//! - `encoder`: Command encoder wrapper, render passes and texture/buffer copies.
//! - `error`: Error and result types shared across the crate.
//! - `pipeline`: Render pipeline and bind group construction.
//! - `texture`: GPU texture allocation and view construction.
//! - `wgpu`: Entry point for creating WGPU instances and requesting a default device.

mod adapter;
mod device;
mod encoder;
mod error;
mod pipeline;
mod texture;
mod wgpu;

pub use adapter::{Adapter, AdapterBuilder};
pub use device::{Device, DeviceBuilder};
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use pipeline::{Binding, LayoutBuilder, Pipeline, PipelineBuilder};
pub use texture::{Texture, TextureBuilder};
pub use wgpu::WGPU;
