//! The `Tensor` data model: rank, shape, strides, offset, and a tagged storage variant.
//! Grounded in the `tensor` struct of `original_source/tensor.h`, reshaped from a manually
//! managed C struct into an owned/shared Rust value with `Rc<RefCell<_>>` host storage so
//! that shape-op views can alias a buffer the way the original's `ownsData = false` tensors
//! do, while `Clone` stays cheap.

use std::cell::RefCell;
use std::rc::Rc;

use crate::channel::Channels;
use crate::error::{Error, Result};

mod arithmetic;
mod shape;
mod transfer;
mod transform;

pub use arithmetic::{BinaryOp, UnaryOp};

/// GPU-resident storage: a texture allocated through `atlas-wgpu`, plus the channel format
/// and mipmap flag needed to reconstruct sampler state.
pub struct GpuStorage {
    pub texture: atlas_wgpu::Texture,
    pub channels: Channels,
    pub mipmapped: bool,
}

/// A tensor mid-transfer to host memory via an async buffer mapping. Reading its value is
/// illegal until the transfer completes (`original_source/tensor.c`'s `gpu == 2` state).
pub struct InFlightStorage {
    pub buffer: wgpu::Buffer,
    pub byte_size: u32,
    pub channels: Channels,
}

pub enum Storage {
    Host(Rc<RefCell<Vec<f32>>>),
    Gpu(Rc<GpuStorage>),
    InFlight(Rc<InFlightStorage>),
}

impl Storage {
    pub fn is_host(&self) -> bool {
        matches!(self, Storage::Host(_))
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self, Storage::Gpu(_))
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Storage::InFlight(_))
    }
}

/// A ranked array living on host memory or as a GPU texture. Views (produced by shape
/// operations) share `storage` with their source and carry `owns_data = false` until
/// [`Tensor::take_ownership`] materializes an independent copy.
pub struct Tensor {
    pub(crate) rank: usize,
    pub(crate) shape: [u32; 4],
    pub(crate) strides: [i64; 4],
    pub(crate) offset: i64,
    pub(crate) size: u32,
    pub(crate) owns_data: bool,
    pub(crate) storage: Storage,
}

impl Tensor {
    /// Builds a fresh, owned, contiguous host tensor from `shape` and `data`.
    pub fn from_host(shape: &[u32], data: Vec<f32>) -> Self {
        let size: u32 = shape.iter().product();
        assert_eq!(size as usize, data.len(), "data length doesn't match the shape");
        let mut padded = [1u32; 4];
        padded[..shape.len()].copy_from_slice(shape);
        Self {
            rank: shape.len(),
            shape: padded,
            strides: canonical_strides(&padded, shape.len()),
            offset: 0,
            size,
            owns_data: true,
            storage: Storage::Host(Rc::new(RefCell::new(data))),
        }
    }

    /// Builds a rank-0 scalar tensor.
    pub fn scalar(value: f32) -> Self {
        Self::from_host(&[], vec![value])
    }

    /// Builds a rank-1 vector tensor.
    pub fn vector(data: Vec<f32>) -> Self {
        let len = data.len() as u32;
        Self::from_host(&[len], data)
    }

    /// Builds a fresh, owned GPU tensor wrapping an already-rendered-into texture. Used by
    /// compute-step output allocation (`newTensorsInitialized`'s return construction, both
    /// the fresh-allocate and cache-reuse branches, which both end with `mipmapped = false`).
    pub fn from_gpu(shape: &[u32], texture: atlas_wgpu::Texture, channels: Channels, mipmapped: bool) -> Self {
        let size: u32 = shape.iter().product();
        let mut padded = [1u32; 4];
        padded[..shape.len()].copy_from_slice(shape);
        Self {
            rank: shape.len(),
            shape: padded,
            strides: canonical_strides(&padded, shape.len()),
            offset: 0,
            size,
            owns_data: true,
            storage: Storage::Gpu(Rc::new(GpuStorage { texture, channels, mipmapped })),
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn shape(&self) -> &[u32] {
        &self.shape[..self.rank]
    }

    pub fn strides(&self) -> &[i64] {
        &self.strides[..self.rank]
    }

    /// The full 4-entry stride array, including the padding entries beyond `rank` that a
    /// compute step's uniform upload needs (the `ivec4`-indexed sampling helpers always
    /// address by a full 4-component index, matching `original_source/tensor.h`'s tensor
    /// struct, which never truncates `strides`/`shape` to the logical rank).
    pub fn strides_padded(&self) -> [i64; 4] {
        self.strides
    }

    /// The full 4-entry shape array; see [`Tensor::strides_padded`].
    pub fn shape_padded(&self) -> [u32; 4] {
        self.shape
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn owns_data(&self) -> bool {
        self.owns_data
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn is_gpu(&self) -> bool {
        self.storage.is_gpu()
    }

    pub fn is_in_flight(&self) -> bool {
        self.storage.is_in_flight()
    }

    /// Standard row-major strides for the current shape, ignoring any view offset.
    pub fn canonical_strides(&self) -> [i64; 4] {
        canonical_strides(&self.shape, self.rank)
    }

    pub fn is_contiguous(&self) -> bool {
        self.strides() == &self.canonical_strides()[..self.rank]
    }

    /// Reads the host buffer this tensor views, cloning only the `Rc`. Panics if the
    /// tensor is not on host memory; callers must `to_host_memory` first.
    pub(crate) fn host_data(&self) -> Rc<RefCell<Vec<f32>>> {
        match &self.storage {
            Storage::Host(data) => data.clone(),
            _ => panic!("tensor is not on host memory"),
        }
    }

    /// Reads one logical element by multi-dimensional index, honoring strides/offset.
    pub fn get(&self, indices: &[i64]) -> Result<f32> {
        if self.is_in_flight() {
            return Err(Error::TensorInFlight);
        }
        let data = self.host_data();
        let data = data.borrow();
        let idx = self.linear_index(indices);
        Ok(data[idx as usize])
    }

    /// Copies this tensor's logical elements out as a flat, row-major `Vec<f32>`, honoring
    /// strides/offset. Requires a contiguous host tensor (call [`Tensor::ensure_contiguous`]
    /// and [`Tensor::to_host_memory`] first); used by `atlas-kettle`'s serializer, which
    /// mirrors `kettle`'s direct `memcpy` of `t->data` in `original_source/tensor.c`.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        if self.is_in_flight() {
            return Err(Error::TensorInFlight);
        }
        if !self.is_contiguous() {
            return Err(Error::ShapeMismatch("to_vec requires a contiguous tensor"));
        }
        let data = self.host_data();
        let data = data.borrow();
        let start = self.offset as usize;
        let end = start + self.size as usize;
        Ok(data[start..end].to_vec())
    }

    pub(crate) fn linear_index(&self, indices: &[i64]) -> i64 {
        let mut idx = self.offset;
        for i in 0..self.rank {
            idx += indices[i] * self.strides[i];
        }
        idx
    }

    /// Clones this tensor as a view: same metadata, shared storage, `owns_data = false`.
    pub fn view(&self) -> Self {
        Self {
            rank: self.rank,
            shape: self.shape,
            strides: self.strides,
            offset: self.offset,
            size: self.size,
            owns_data: false,
            storage: match &self.storage {
                Storage::Host(data) => Storage::Host(data.clone()),
                Storage::Gpu(tex) => Storage::Gpu(tex.clone()),
                Storage::InFlight(buf) => Storage::InFlight(buf.clone()),
            },
        }
    }
}

pub(crate) fn canonical_strides(shape: &[u32; 4], rank: usize) -> [i64; 4] {
    let mut strides = [1i64; 4];
    let mut size = 1i64;
    for i in (0..rank).rev() {
        strides[i] = size;
        size *= shape[i] as i64;
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_host_computes_canonical_strides() {
        let t = Tensor::from_host(&[2, 3], vec![0.0; 6]);
        assert_eq!(t.strides(), &[3, 1]);
        assert!(t.is_contiguous());
    }

    #[test]
    fn view_shares_storage_and_clears_ownership() {
        let t = Tensor::from_host(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let v = t.view();
        assert!(t.owns_data());
        assert!(!v.owns_data());
        assert_eq!(v.get(&[0, 1]).unwrap(), 2.0);
    }
}
