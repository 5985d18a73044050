//! Ambient-IO adapters that delegate real parsing work to external crates, matching how the
//! original delegates to bundled third-party decoders (`stb_image` for rasters, `cgltf` for
//! scenes) rather than hand-rolling a codec.

pub mod gltf;
pub mod image;
