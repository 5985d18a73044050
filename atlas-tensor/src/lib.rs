//! The tensor data model: ranked arrays that live on host memory or as GPU textures, plus
//! the stack of tensor handles a compiled program operates over.
//!
//! Grounded in `original_source/tensor.h`/`tensor.c`. Host storage is an `Rc<RefCell<Vec<f32>>>`
//! so that shape-op views can alias a buffer the same way the original's `ownsData = false`
//! tensors do, without resorting to raw pointers; GPU storage wraps an `atlas_wgpu::Texture`.
//!
//! ## Modules
//!
//! - `channel`: numeric channel-format codes for GPU texture layouts.
//! - `error`: error and result types shared across the crate.
//! - `tensor`: the `Tensor` struct, its `Storage` variants, and shape/arithmetic/transform/
//!   transfer operations (each implemented in its own submodule).
//! - `stack`: the tensor stack and its bounded GPU-texture reuse cache.

mod channel;
mod error;
mod stack;
mod tensor;

pub use channel::{ChannelKind, Channels};
pub use error::{Error, Result};
pub use stack::{TensorStack, CACHE_SIZE};
pub use tensor::{BinaryOp, GpuStorage, InFlightStorage, Storage, Tensor, UnaryOp};
