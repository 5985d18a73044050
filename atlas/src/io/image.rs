//! Raster image loading backing `Step::Img`.
//!
//! Grounded in `tensorFromImageFile` in `original_source/tensor.c`, which forces every image
//! to 4-channel RGBA, normalizes bytes to `0.0..=1.0`, and stores it column-major with X as
//! the outer dimension and Y flipped bottom-up (OpenGL texture-coordinate convention). We
//! reuse that exact `(width, height, 4)` shape/orientation convention (SPEC_FULL.md's
//! image-loader-vs-channeled-compute shape-convention decision), but decode the file itself
//! with the `image` crate instead of a vendored `stb_image`.

use atlas_tensor::Tensor;

use crate::error::Detail;

pub fn load(path: &str) -> std::result::Result<Tensor, Detail> {
    let img = image::open(path).map_err(|e| Detail::Image(path.to_string(), e.to_string()))?.to_rgba8();

    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut data = vec![0.0f32; w * h * 4];

    for x in 0..w {
        for y in 0..h {
            let pixel = img.get_pixel(x as u32, y as u32);
            let dest_y = h - 1 - y;
            let dest_idx = (x * h + dest_y) * 4;
            for c in 0..4 {
                data[dest_idx + c] = pixel.0[c] as f32 / 255.0;
            }
        }
    }

    Ok(Tensor::from_host(&[width, height, 4], data))
}
