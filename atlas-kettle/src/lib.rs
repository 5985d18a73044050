//! Streaming serialization of tensor stacks to and from the Kettle binary format: a zlib-
//! compressed sequence of tensor headers and payloads, written in one pass and read back
//! through a time-sliced state machine so a large load never blocks a frame.
//!
//! Grounded in `kettle`/`unkettleState`/`unkettle`/`resetUnkettleState` in
//! `original_source/tensor.c`, built on `atlas-wgpu` for texture uploads and `atlas-tensor`
//! for the tensor stack.
//!
//! ## Modules
//!
//! - `format`: the on-disk header/meta layout.
//! - `write`: `kettle`, the one-shot write path.
//! - `read`: `Unkettle`, the time-sliced read path.
//! - `error`: error and result types shared across the crate.

mod error;
mod format;
mod read;
mod write;

pub use error::{Error, Result};
pub use format::{KettleHeader, KettleMeta, MAGIC};
pub use read::{Progress, Unkettle};
pub use write::kettle;
