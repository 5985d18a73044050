//! On-disk layout, grounded in `KettleHeader`/`KettleMeta` in `original_source/tensor.c`.
//!
//! Both structs are written with a raw `memcpy` in the original, so their Rust mirrors are
//! `#[repr(C)]` PODs read and written with `bytemuck`, the same pattern `atlas-compute`'s
//! uniform structs use.

/// The real magic value `kettle`/`unkettle` read and write. `KettleHeader`'s comment in the
/// original source claims `0x4B544C32` ("KTL2"), but the struct literal the writer actually
/// constructs, and the value the reader actually checks, is `0x4B544C31` ("KTL1") — the
/// comment is stale. We ground on the executed value.
pub const MAGIC: u32 = 0x4B544C31;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KettleHeader {
    pub magic: u32,
    pub count: u32,
}

impl KettleHeader {
    pub fn new(count: u32) -> Self {
        Self { magic: MAGIC, count }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KettleMeta {
    pub rank: u32,
    pub shape: [u32; 4],
    pub channels: u32,
    pub is_gpu: u32,
    pub size: u32,
    pub mipmapped: u32,
    pub layers: u32,
    pub width: u32,
    pub height: u32,
}

impl KettleMeta {
    pub fn is_quantized(&self) -> bool {
        (10..100).contains(&self.channels) && self.channels % 10 == 0
    }

    /// Element size in bytes a payload of `size` elements occupies on disk: 1 for a
    /// u8-quantized channeled tensor, 4 for a raw `f32` one.
    pub fn element_size(&self) -> u32 {
        if self.is_quantized() {
            1
        } else {
            4
        }
    }

    pub fn payload_len(&self) -> usize {
        self.size as usize * self.element_size() as usize
    }
}
