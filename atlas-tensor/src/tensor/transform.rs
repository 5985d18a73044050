//! Matrix multiply and the 4x4 transform constructors, grounded in
//! `original_source/tensor.c`'s `tensorMultiplyHelper`, `tensorRotate`, `tensorTranslate`,
//! `tensorProject`, and `tensorOrtho`.

use std::f32::consts::PI;

use crate::error::{Error, Result};
use crate::tensor::Tensor;

impl Tensor {
    /// `self` is the top-of-stack operand (`a`), `other` is the operand below it (`b`).
    /// Requires `other.shape[1] == self.shape[0]`; produces a rank-2 tensor of shape
    /// `(other.shape[0], self.shape[1])`.
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        let a = self;
        let b = other;
        if a.rank != 2 || b.rank != 2 {
            return Err(Error::ShapeMismatch("matmul requires rank-2 tensors"));
        }
        if b.shape()[1] != a.shape()[0] {
            return Err(Error::MatmulShapeMismatch);
        }
        let out_rows = b.shape()[0];
        let out_cols = a.shape()[1];
        let contraction = b.shape()[1];
        let mut data = vec![0.0f32; (out_rows * out_cols) as usize];
        for i in 0..out_rows {
            for j in 0..out_cols {
                let mut val = 0.0f32;
                for k in 0..contraction {
                    val += a.get(&[k as i64, j as i64])? * b.get(&[i as i64, k as i64])?;
                }
                data[(i * out_cols + j) as usize] = val;
            }
        }
        Ok(Tensor::from_host(&[out_rows, out_cols], data))
    }

    /// Builds a 4x4 rotation matrix around the axis held in `self` (a length-3 vector,
    /// normalized internally) by the scalar angle (radians) in `angle`.
    pub fn rotate(&self, angle: &Tensor) -> Result<Tensor> {
        let angle = angle.get(&[])?;
        let x = self.get(&[0])?;
        let y = self.get(&[1])?;
        let z = self.get(&[2])?;
        let d = (x * x + y * y + z * z).sqrt();
        let (x, y, z) = (x / d, y / d, z / d);
        let c = angle.cos();
        let c1 = 1.0 - c;
        let s = angle.sin();
        #[rustfmt::skip]
        let data = vec![
            c + x * x * c1,       x * y * c1 - z * s,   x * z * c1 + y * s,   0.0,
            y * x * c1 + z * s,   c + y * y * c1,       y * z * c1 - x * s,   0.0,
            z * x * c1 - y * s,   z * y * c1 + x * s,   c + z * z * c1,       0.0,
            0.0,                  0.0,                  0.0,                  1.0,
        ];
        Ok(Tensor::from_host(&[4, 4], data))
    }

    /// Builds a 4x4 translation matrix from `self`, a length-3 vector `(x, y, z)`.
    pub fn translate(&self) -> Result<Tensor> {
        let x = self.get(&[0])?;
        let y = self.get(&[1])?;
        let z = self.get(&[2])?;
        #[rustfmt::skip]
        let data = vec![
            1.0, 0.0, 0.0, x,
            0.0, 1.0, 0.0, y,
            0.0, 0.0, 1.0, z,
            0.0, 0.0, 0.0, 1.0,
        ];
        Ok(Tensor::from_host(&[4, 4], data))
    }

    /// Builds a 4x4 perspective-projection matrix from `self`, a length-5 vector
    /// `(fovDegrees, width, height, near, far)`.
    pub fn project(&self) -> Result<Tensor> {
        let fov = ((self.get(&[0])? * PI / 180.0) / 2.0).tan();
        let width = self.get(&[1])?;
        let height = self.get(&[2])?;
        let near = self.get(&[3])?;
        let far = self.get(&[4])?;
        let aspect = (width / height).sqrt();
        #[rustfmt::skip]
        let data = vec![
            fov / aspect, 0.0,          0.0,                          0.0,
            0.0,          fov * aspect, 0.0,                          0.0,
            0.0,          0.0,          -(far + near) / (far - near), -2.0 * far * near / (far - near),
            0.0,          0.0,          -1.0,                         0.0,
        ];
        Ok(Tensor::from_host(&[4, 4], data))
    }

    /// Builds a 4x4 orthographic-projection matrix from `self`, a length-6 vector
    /// `(left, right, bottom, top, near, far)`.
    pub fn ortho(&self) -> Result<Tensor> {
        let left = self.get(&[0])?;
        let right = self.get(&[1])?;
        let bottom = self.get(&[2])?;
        let top = self.get(&[3])?;
        let near = self.get(&[4])?;
        let far = self.get(&[5])?;
        let rl = right - left;
        let rlp = right + left;
        let tb = top - bottom;
        let tbp = top + bottom;
        let fn_ = far - near;
        let fnp = far + near;
        #[rustfmt::skip]
        let data = vec![
            2.0 / rl, 0.0,      0.0,       -rlp / rl,
            0.0,      2.0 / tb, 0.0,       -tbp / tb,
            0.0,      0.0,      -2.0 / fn_, -fnp / fn_,
            0.0,      0.0,      0.0,        1.0,
        ];
        Ok(Tensor::from_host(&[4, 4], data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn matmul_identity_is_noop() {
        let identity = Tensor::from_host(&[2, 2], vec![1.0, 0.0, 0.0, 1.0]);
        let m = Tensor::from_host(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let product = m.matmul(&identity).unwrap();
        assert_eq!(product.get(&[0, 0]).unwrap(), 1.0);
        assert_eq!(product.get(&[0, 1]).unwrap(), 2.0);
        assert_eq!(product.get(&[1, 0]).unwrap(), 3.0);
        assert_eq!(product.get(&[1, 1]).unwrap(), 4.0);
    }

    #[test]
    fn translate_builds_expected_matrix() {
        let v = Tensor::from_host(&[3], vec![1.0, 2.0, 3.0]);
        let m = v.translate().unwrap();
        assert_eq!(m.get(&[0, 3]).unwrap(), 1.0);
        assert_eq!(m.get(&[1, 3]).unwrap(), 2.0);
        assert_eq!(m.get(&[2, 3]).unwrap(), 3.0);
        assert_eq!(m.get(&[3, 3]).unwrap(), 1.0);
    }

    #[test]
    fn rotate_about_z_by_half_pi() {
        let axis = Tensor::from_host(&[3], vec![0.0, 0.0, 1.0]);
        let angle = Tensor::scalar(PI / 2.0);
        let m = axis.rotate(&angle).unwrap();
        assert!((m.get(&[0, 0]).unwrap()).abs() < 1e-5);
        assert!((m.get(&[0, 1]).unwrap() + 1.0).abs() < 1e-5);
    }
}
