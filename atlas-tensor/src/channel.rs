//! Channel format codes for GPU tensors, grounded in `original_source/tensor.c`'s
//! `takeOwnership`/`tensorToHostMemoryReally` switch tables.
//!
//! A channeled GPU tensor is rank 3 with shape `(width, height, channelCount)`. The code
//! also picks the element type the texture stores: float32, u8 (normalized), or half-float.

/// Element representation for a channeled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    F32,
    U8,
    F16,
}

/// A compute step's channel format: either the generic RGBA32F packing (`Generic`) or an
/// explicit `(channelCount, kind)` texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Generic,
    Explicit { count: u32, kind: ChannelKind },
}

impl Channels {
    /// Decodes the numeric channel code used in compute step declarations and kettle
    /// headers: 0 is generic; 1-4 is f32; 10-40 is u8; 100-400 is f16.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Channels::Generic,
            1..=4 => Channels::Explicit { count: code, kind: ChannelKind::F32 },
            10..=40 if code % 10 == 0 => Channels::Explicit { count: code / 10, kind: ChannelKind::U8 },
            100..=400 if code % 100 == 0 => Channels::Explicit { count: code / 100, kind: ChannelKind::F16 },
            _ => panic!("unknown channel format code {code}"),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Channels::Generic => 0,
            Channels::Explicit { count, kind: ChannelKind::F32 } => count,
            Channels::Explicit { count, kind: ChannelKind::U8 } => count * 10,
            Channels::Explicit { count, kind: ChannelKind::F16 } => count * 100,
        }
    }

    /// Number of `f32` scalars packed per texel: 4 for the generic layout, otherwise the
    /// channel count (texture format always stores up to 4 channels per texel).
    pub fn floats_per_texel(self) -> u32 {
        match self {
            Channels::Generic => 4,
            Channels::Explicit { count, .. } => count,
        }
    }

    pub fn wgpu_format(self) -> wgpu::TextureFormat {
        use wgpu::TextureFormat::*;
        match self {
            Channels::Generic => Rgba32Float,
            Channels::Explicit { count: 1, kind: ChannelKind::F32 } => R32Float,
            Channels::Explicit { count: 1, kind: ChannelKind::U8 } => R8Unorm,
            Channels::Explicit { count: 1, kind: ChannelKind::F16 } => R16Float,
            Channels::Explicit { count: 2, kind: ChannelKind::F32 } => Rg32Float,
            Channels::Explicit { count: 2, kind: ChannelKind::U8 } => Rg8Unorm,
            Channels::Explicit { count: 2, kind: ChannelKind::F16 } => Rg16Float,
            Channels::Explicit { count: 3, kind: ChannelKind::F32 } => Rgba32Float,
            Channels::Explicit { count: 3, kind: ChannelKind::U8 } => Rgba8Unorm,
            Channels::Explicit { count: 3, kind: ChannelKind::F16 } => Rgba16Float,
            Channels::Explicit { count: 4, kind: ChannelKind::F32 } => Rgba32Float,
            Channels::Explicit { count: 4, kind: ChannelKind::U8 } => Rgba8Unorm,
            Channels::Explicit { count: 4, kind: ChannelKind::F16 } => Rgba16Float,
            Channels::Explicit { count, .. } => panic!("unsupported channel count {count}"),
        }
    }

    /// True for the u8-quantized formats kettle serializes with a clamp-and-scale payload.
    pub fn is_quantized(self) -> bool {
        matches!(self, Channels::Explicit { kind: ChannelKind::U8, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_generic_and_explicit_codes() {
        assert_eq!(Channels::from_code(0), Channels::Generic);
        assert_eq!(Channels::from_code(3), Channels::Explicit { count: 3, kind: ChannelKind::F32 });
        assert_eq!(Channels::from_code(20), Channels::Explicit { count: 2, kind: ChannelKind::U8 });
        assert_eq!(Channels::from_code(400), Channels::Explicit { count: 4, kind: ChannelKind::F16 });
    }

    #[test]
    fn round_trips_through_code() {
        for code in [0, 1, 2, 3, 4, 10, 20, 30, 40, 100, 200, 300, 400] {
            assert_eq!(Channels::from_code(code).code(), code);
        }
    }
}
