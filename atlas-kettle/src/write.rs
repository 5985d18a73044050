//! `kettle`: serializes the top `count` tensors of a stack to disk. Grounded in `kettle` in
//! `original_source/tensor.c`'s three-pass write (size, serialize, compress-and-write).
//!
//! Unlike the original, which mutates each tensor in place via `tensorToHostMemoryReally`
//! before peeking its data, here `Tensor::to_host_memory` returns an independent view and
//! the stack itself is only read, never mutated — `kettle` does not pop, matching the
//! original's "logically popped, never actually popped" contract.

use std::io::Write;
use std::path::Path;

use atlas_tensor::{Channels, Storage, Tensor, TensorStack};
use atlas_wgpu::Device;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};
use crate::format::{KettleHeader, KettleMeta};

/// Serializes the top `count` tensors of `stack` (bottom-to-top order) to `path`, without
/// removing them from the stack.
pub fn kettle(device: &Device, stack: &TensorStack, count: u32, path: impl AsRef<Path>) -> Result<()> {
    let start = validate_count(stack.len(), count)?;

    let mut metas = Vec::with_capacity(count as usize);
    let mut payloads: Vec<Vec<u8>> = Vec::with_capacity(count as usize);

    for i in 0..count as usize {
        let tensor = stack.get(start + i)?;
        let (meta, payload) = serialize_one(device, tensor)?;
        metas.push(meta);
        payloads.push(payload);
    }

    let mut raw = Vec::new();
    raw.extend_from_slice(bytemuck::bytes_of(&KettleHeader::new(count)));
    for (meta, payload) in metas.iter().zip(payloads.iter()) {
        raw.extend_from_slice(bytemuck::bytes_of(meta));
        raw.extend_from_slice(payload);
    }
    let uncompressed_size = raw.len() as u32;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    let compressed = encoder.finish()?;
    let compressed_size = compressed.len() as u32;

    let path = path.as_ref();
    let mut file = std::fs::File::create(path).map_err(|source| Error::Write { path: path.display().to_string(), source })?;
    file.write_all(&uncompressed_size.to_le_bytes())?;
    file.write_all(&compressed_size.to_le_bytes())?;
    file.write_all(&compressed)?;

    tracing::debug!(
        tensors = count,
        uncompressed = uncompressed_size,
        compressed = compressed_size,
        ratio = compressed_size as f32 / uncompressed_size.max(1) as f32 * 100.0,
        "kettled {}",
        path.display()
    );
    Ok(())
}

fn validate_count(available: usize, count: u32) -> Result<usize> {
    if count as usize > available {
        Err(Error::StackUnderflow { requested: count, available })
    } else {
        Ok(available - count as usize)
    }
}

fn serialize_one(device: &Device, tensor: &Tensor) -> Result<(KettleMeta, Vec<u8>)> {
    // A GPU tensor in the generic RGBA32F packing (`to_gpu_memory`'s square-ish layout) has
    // no semantic channels and may pad its texture beyond the tensor's logical size, so
    // there is no self-consistent way to round-trip it as a texture. Persist it the same
    // way a host tensor is persisted instead; the next `to_gpu_memory` call re-packs it.
    // Only explicitly channeled textures (images, render targets) are kettled as GPU.
    let channels = match tensor.storage() {
        Storage::Gpu(gpu) if matches!(gpu.channels, Channels::Explicit { .. }) => Some(gpu.channels),
        _ => None,
    };

    let mut meta = KettleMeta {
        rank: tensor.rank() as u32,
        shape: tensor.shape_padded(),
        channels: channels.map(|c| c.code()).unwrap_or(0),
        is_gpu: channels.is_some() as u32,
        size: tensor.size(),
        mipmapped: 0,
        layers: 1,
        width: 0,
        height: 0,
    };
    if let (Some(_), Storage::Gpu(gpu)) = (channels, tensor.storage()) {
        meta.layers = gpu.texture.layers();
        meta.width = gpu.texture.width();
        meta.height = gpu.texture.height();
        meta.mipmapped = gpu.mipmapped as u32;
    }

    let host = tensor.to_host_memory(device)?.ensure_contiguous()?;
    let data = host.to_vec()?;

    let payload = if meta.is_quantized() {
        data.iter().map(|&v| (v.clamp(0.0, 1.0) * 255.0) as u8).collect()
    } else {
        bytemuck::cast_slice(&data).to_vec()
    };

    Ok((meta, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn underflow_is_rejected() {
        assert!(matches!(validate_count(0, 1), Err(Error::StackUnderflow { requested: 1, available: 0 })));
        assert_eq!(validate_count(3, 2).unwrap(), 1);
    }

    // `kettle` itself requires a `Device` to round-trip GPU tensors through host memory, so
    // the full write path is exercised by `#[ignore]`d GPU tests in the `atlas` crate's
    // integration suite.
}
