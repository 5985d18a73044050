//! Host <-> GPU transfer, grounded in `original_source/tensor.c`'s `tensorToGPUMemory`,
//! `tensorToHostMemoryReally`, and `takeOwnership`. `to_host_memory` here is the synchronous
//! barrier the original calls out as a last resort; `transfer_start`/`transfer_end` are the
//! asynchronous pixel-buffer pair it recommends instead.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;

use atlas_wgpu::Device;

use crate::channel::Channels;
use crate::error::{Error, Result};
use crate::tensor::{canonical_strides, GpuStorage, InFlightStorage, Storage, Tensor};

const ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) / align * align
}

impl Tensor {
    /// Uploads host data to a fresh generic (RGBA32F) GPU texture. No-op if already on GPU.
    pub fn to_gpu_memory(&self, device: &Device) -> Result<Tensor> {
        if self.is_gpu() {
            return Ok(self.view());
        }
        let contiguous = self.ensure_contiguous()?;
        let size = contiguous.size;
        let texels = (size + 3) / 4;
        let texels = texels.max(1);
        let width = (texels as f64).sqrt().ceil() as u32;
        let height = (texels + width - 1) / width;

        let data = contiguous.host_data();
        let data = data.borrow();
        let start = contiguous.offset as usize;
        let mut padded = vec![0.0f32; (width * height * 4) as usize];
        padded[..size as usize].copy_from_slice(&data[start..start + size as usize]);
        drop(data);

        let texture = device.texture(Channels::Generic.wgpu_format()).empty(width, height, 1);
        let bytes: &[u8] = bytemuck::cast_slice(&padded);
        device.write_texture(texture.raw(), 0, bytes, width * 4 * 4, width, height);

        Ok(Tensor {
            rank: contiguous.rank,
            shape: contiguous.shape,
            strides: contiguous.strides,
            offset: 0,
            size: contiguous.size,
            owns_data: true,
            storage: Storage::Gpu(Rc::new(GpuStorage {
                texture,
                channels: Channels::Generic,
                mipmapped: false,
            })),
        })
    }

    /// Synchronous GPU -> host readback: reads every layer back, then gathers the logical
    /// tensor out of the raw texel buffer using the tensor's current shape/strides/offset.
    /// No-op if already on host. A blocking call; prefer `transfer_start`/`transfer_end` on
    /// the hot path.
    pub fn to_host_memory(&self, device: &Device) -> Result<Tensor> {
        match &self.storage {
            Storage::Host(_) => Ok(self.view()),
            Storage::InFlight(_) => Err(Error::TensorInFlight),
            Storage::Gpu(gpu) => {
                let raw = read_texture_to_vec(device, gpu)?;
                self.gather_from_flat_buffer(&raw)
            }
        }
    }

    /// Begins an asynchronous GPU -> host readback, returning an in-flight tensor. Call
    /// `transfer_end` once the caller has allowed the device to make progress (e.g. after a
    /// `device.poll`) to obtain the host tensor.
    pub fn transfer_start(&self, device: &Device) -> Result<Tensor> {
        let gpu = match &self.storage {
            Storage::Gpu(gpu) => gpu.clone(),
            Storage::Host(_) => return Ok(self.view()),
            Storage::InFlight(_) => return Err(Error::TensorInFlight),
        };
        let floats_per_texel = gpu.channels.floats_per_texel();
        let width = gpu.texture.width();
        let height = gpu.texture.height();
        let layers = gpu.texture.layers();
        let bytes_per_row = align_up(width * floats_per_texel * 4, ROW_ALIGNMENT);
        let byte_size = bytes_per_row * height * layers;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("atlas-transfer-staging"),
            size: byte_size as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.encoder("atlas-transfer-start");
        for layer in 0..layers {
            encoder.copy_texture_to_buffer(
                gpu.texture.raw(),
                layer,
                width,
                height,
                bytes_per_row,
                &buffer,
            );
        }
        device.submit(encoder.finish());

        Ok(Tensor {
            rank: self.rank,
            shape: self.shape,
            strides: self.strides,
            offset: self.offset,
            size: self.size,
            owns_data: self.owns_data,
            storage: Storage::InFlight(Rc::new(InFlightStorage {
                buffer,
                byte_size,
                channels: gpu.channels,
            })),
        })
    }

    /// Blocks until the transfer started by `transfer_start` completes, then gathers the
    /// logical host tensor out of the mapped buffer. Errors if `self` is not in flight.
    pub fn transfer_end(&self, device: &Device) -> Result<Tensor> {
        let in_flight = match &self.storage {
            Storage::InFlight(buf) => buf.clone(),
            _ => return Err(Error::ShapeMismatch("transfer_end requires an in-flight tensor")),
        };
        let slice = in_flight.buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv().expect("map_async callback dropped").expect("failed to map staging buffer");
        let raw: Vec<f32> = bytemuck::cast_slice(&slice.get_mapped_range()).to_vec();
        in_flight.buffer.unmap();

        self.gather_from_flat_buffer(&raw)
    }

    /// Ensures this tensor owns independent storage, materializing a copy if it's a view.
    /// Host tensors are also made contiguous (matching the original's CPU path).
    pub fn take_ownership(&self, device: &Device) -> Result<Tensor> {
        if self.owns_data {
            return Ok(self.view());
        }
        match &self.storage {
            Storage::InFlight(_) => Err(Error::TensorInFlight),
            Storage::Host(_) => self.ensure_contiguous(),
            Storage::Gpu(gpu) => {
                let texture = device
                    .texture(gpu.channels.wgpu_format())
                    .with_mipmaps(gpu.mipmapped)
                    .empty(gpu.texture.width(), gpu.texture.height(), gpu.texture.layers());
                let mut encoder = device.encoder("atlas-take-ownership");
                for layer in 0..gpu.texture.layers() {
                    encoder.copy_texture_to_texture(gpu.texture.raw(), texture.raw(), layer, texture.width(), texture.height());
                }
                device.submit(encoder.finish());
                Ok(Tensor {
                    rank: self.rank,
                    shape: self.shape,
                    strides: self.strides,
                    offset: self.offset,
                    size: self.size,
                    owns_data: true,
                    storage: Storage::Gpu(Rc::new(GpuStorage {
                        texture,
                        channels: gpu.channels,
                        mipmapped: gpu.mipmapped,
                    })),
                })
            }
        }
    }

    fn gather_from_flat_buffer(&self, raw: &[f32]) -> Result<Tensor> {
        let total = self.size as usize;
        let mut data = vec![0.0f32; total];
        let mut indices = [0i64; 4];
        let std_strides = canonical_strides(&self.shape, self.rank);
        for dest_idx in 0..total {
            let idx = self.linear_index(&indices[..self.rank]);
            data[dest_idx] = raw[idx as usize];
            for i in (0..self.rank).rev() {
                indices[i] += 1;
                if (indices[i] as u32) < self.shape[i] {
                    break;
                }
                indices[i] = 0;
            }
        }
        Ok(Tensor {
            rank: self.rank,
            shape: self.shape,
            strides: std_strides,
            offset: 0,
            size: self.size,
            owns_data: true,
            storage: Storage::Host(Rc::new(RefCell::new(data))),
        })
    }
}

fn read_texture_to_vec(device: &Device, gpu: &GpuStorage) -> Result<Vec<f32>> {
    let floats_per_texel = gpu.channels.floats_per_texel();
    let width = gpu.texture.width();
    let height = gpu.texture.height();
    let layers = gpu.texture.layers();
    let bytes_per_row = align_up(width * floats_per_texel * 4, ROW_ALIGNMENT);
    let byte_size = bytes_per_row * height * layers;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("atlas-readback-staging"),
        size: byte_size as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.encoder("atlas-to-host-memory");
    for layer in 0..layers {
        encoder.copy_texture_to_buffer(gpu.texture.raw(), layer, width, height, bytes_per_row, &buffer);
    }
    device.submit(encoder.finish());

    let slice = buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv().expect("map_async callback dropped").expect("failed to map staging buffer");

    let row_floats = (bytes_per_row / 4) as usize;
    let logical_row_floats = (width * floats_per_texel) as usize;
    let mapped: &[u8] = &slice.get_mapped_range();
    let all_floats: &[f32] = bytemuck::cast_slice(mapped);
    let mut out = Vec::with_capacity((logical_row_floats * height as usize * layers as usize) as usize);
    for row in all_floats.chunks(row_floats) {
        out.extend_from_slice(&row[..logical_row_floats]);
    }
    drop(all_floats);
    buffer.unmap();
    Ok(out)
}
