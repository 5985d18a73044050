//! View-producing and owned-copy-producing shape operations, grounded in the `tensor*Helper`
//! functions of `original_source/tensor.c`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::tensor::{canonical_strides, Storage, Tensor};

impl Tensor {
    /// Swaps `shape`/`strides` entries at the two axes; a view.
    pub fn transpose(&self, axis1: usize, axis2: usize) -> Result<Tensor> {
        if axis1 >= self.rank || axis2 >= self.rank {
            return Err(Error::AxisOutOfBounds { axis: axis1.max(axis2), rank: self.rank });
        }
        let mut out = self.view();
        out.shape.swap(axis1, axis2);
        out.strides.swap(axis1, axis2);
        Ok(out)
    }

    /// Shifts the offset to the last element along `axis` and negates that stride; a view.
    pub fn reverse(&self, axis: usize) -> Result<Tensor> {
        if axis >= self.rank {
            return Err(Error::AxisOutOfBounds { axis, rank: self.rank });
        }
        let mut out = self.view();
        out.offset += out.strides[axis] * (out.shape[axis] as i64 - 1);
        out.strides[axis] = -out.strides[axis];
        Ok(out)
    }

    /// Shifts offset and shrinks shape along `axis`; negative `start`/`end` count from the
    /// end. A view.
    pub fn slice(&self, axis: usize, start: i64, end: i64) -> Result<Tensor> {
        if axis >= self.rank {
            return Err(Error::AxisOutOfBounds { axis, rank: self.rank });
        }
        let len = self.shape[axis] as i64;
        let start = if start < 0 { start + len } else { start };
        let end = if end < 0 { end + len } else { end };
        if start < 0 || end > len || start > end {
            return Err(Error::SliceOutOfRange { start, end, length: len });
        }
        let mut out = self.view();
        out.offset += out.strides[axis] * start;
        out.shape[axis] = (end - start) as u32;
        out.size = out.shape[..out.rank].iter().product();
        Ok(out)
    }

    /// Removes axis 0, adjusting offset to the first element (no-op) or last
    /// ([`Tensor::take_last`]); reduces rank by one. A view.
    pub fn take_first(&self) -> Result<Tensor> {
        if self.rank == 0 {
            return Err(Error::RankZero);
        }
        let mut out = self.view();
        shift_out_axis_zero(&mut out);
        Ok(out)
    }

    /// Like [`Tensor::take_first`] but selects the last element along axis 0.
    pub fn take_last(&self) -> Result<Tensor> {
        if self.rank == 0 {
            return Err(Error::RankZero);
        }
        let mut out = self.view();
        out.offset += (out.shape[0] as i64 - 1) * out.strides[0];
        shift_out_axis_zero(&mut out);
        Ok(out)
    }

    /// Prepends a leading dimension of size 1; a view.
    pub fn enclose(&self) -> Result<Tensor> {
        if self.rank == 4 {
            return Err(Error::RankFour);
        }
        let mut out = self.view();
        for i in (1..=out.rank).rev() {
            out.shape[i] = out.shape[i - 1];
            out.strides[i] = out.strides[i - 1];
        }
        out.shape[0] = 1;
        out.strides[0] = out.strides[1];
        out.rank += 1;
        Ok(out)
    }

    /// Appends a trailing dimension of size 1; a view.
    pub fn extrude(&self) -> Result<Tensor> {
        if self.rank == 4 {
            return Err(Error::RankFour);
        }
        let mut out = self.view();
        out.shape[out.rank] = 1;
        out.strides[out.rank] = if out.rank > 0 { out.strides[out.rank - 1] } else { 1 };
        out.rank += 1;
        Ok(out)
    }

    /// Removes a trailing dimension of size 1; fails if it isn't 1. A view.
    pub fn unextrude(&self) -> Result<Tensor> {
        if self.rank == 0 {
            return Err(Error::RankZero);
        }
        if self.shape[self.rank - 1] != 1 {
            return Err(Error::ShapeMismatch("unextrude requires a trailing dimension of size 1"));
        }
        let mut out = self.view();
        out.rank -= 1;
        Ok(out)
    }

    /// Resets shape (size must be preserved) and strides to canonical row-major; a view.
    pub fn reshape(&self, new_shape: &[u32]) -> Result<Tensor> {
        let new_size: u32 = new_shape.iter().product();
        if new_size != self.size {
            return Err(Error::ReshapeSizeMismatch { new_size: new_size as usize, old_size: self.size as usize });
        }
        let mut out = self.view();
        let mut shape = [1u32; 4];
        shape[..new_shape.len()].copy_from_slice(new_shape);
        out.rank = new_shape.len();
        out.shape = shape;
        out.strides = canonical_strides(&shape, out.rank);
        Ok(out)
    }

    /// Concatenates `self` and `other` along `axis`; requires host memory and produces a
    /// fresh, owned, contiguous tensor.
    pub fn cat(&self, other: &Tensor, axis: usize) -> Result<Tensor> {
        if axis >= self.rank {
            return Err(Error::AxisOutOfBounds { axis, rank: self.rank });
        }
        let mut new_shape = self.shape;
        for i in 0..self.rank {
            if i == axis {
                new_shape[i] = self.shape[i] + other.shape[i];
            } else if self.shape[i] != other.shape[i] {
                return Err(Error::ShapeMismatch("cat requires matching shapes off-axis"));
            }
        }
        let new_strides = canonical_strides(&new_shape, self.rank);
        let total: u32 = new_shape[..self.rank].iter().product();
        let mut data = vec![0.0f32; total as usize];

        let mut indices = [0i64; 4];
        for _ in 0..total {
            let dest_idx: i64 = (0..self.rank).map(|i| indices[i] * new_strides[i]).sum();
            let value = if (indices[axis] as u32) < self.shape[axis] {
                self.get(&indices[..self.rank])?
            } else {
                let mut other_indices = indices;
                other_indices[axis] -= self.shape[axis] as i64;
                other.get(&other_indices[..self.rank])?
            };
            data[dest_idx as usize] = value;
            for i in (0..self.rank).rev() {
                indices[i] += 1;
                if (indices[i] as u32) < new_shape[i] {
                    break;
                }
                indices[i] = 0;
            }
        }

        Ok(Tensor {
            rank: self.rank,
            shape: new_shape,
            strides: new_strides,
            offset: 0,
            size: total,
            owns_data: true,
            storage: Storage::Host(Rc::new(RefCell::new(data))),
        })
    }

    /// Prepends a new leading dimension of size `count`, duplicating the tensor's data;
    /// requires host memory, produces a fresh, owned, contiguous tensor.
    pub fn repeat(&self, count: u32) -> Result<Tensor> {
        if count == 0 {
            return Err(Error::ZeroRepeat);
        }
        if self.rank == 4 {
            return Err(Error::RankFour);
        }
        let contiguous = self.ensure_contiguous()?;
        let old_size = contiguous.size as usize;
        let source = contiguous.host_data();
        let source = source.borrow();
        let slice = &source[contiguous.offset as usize..contiguous.offset as usize + old_size];

        let mut data = Vec::with_capacity(old_size * count as usize);
        for _ in 0..count {
            data.extend_from_slice(slice);
        }

        let mut new_shape = [1u32; 4];
        new_shape[0] = count;
        for i in 0..self.rank {
            new_shape[i + 1] = self.shape[i];
        }
        let new_rank = self.rank + 1;
        let new_strides = canonical_strides(&new_shape, new_rank);

        Ok(Tensor {
            rank: new_rank,
            shape: new_shape,
            strides: new_strides,
            offset: 0,
            size: old_size as u32 * count,
            owns_data: true,
            storage: Storage::Host(Rc::new(RefCell::new(data))),
        })
    }

    /// Replaces the axis dimension of `self` with `indices`, gathering along it;
    /// out-of-range indices (after negative wraparound) are an error, not clamped.
    pub fn index(&self, indices: &Tensor, axis: usize) -> Result<Tensor> {
        if axis >= self.rank {
            return Err(Error::AxisOutOfBounds { axis, rank: self.rank });
        }
        if indices.rank != 1 {
            return Err(Error::ShapeMismatch("index requires a rank-1 indices tensor"));
        }
        let axis_len = self.shape[axis];
        let mut new_shape = self.shape;
        new_shape[axis] = indices.shape[0];
        let new_strides = canonical_strides(&new_shape, self.rank);
        let total: u32 = new_shape[..self.rank].iter().product();
        let mut data = vec![0.0f32; total as usize];

        let mut out_indices = [0i64; 4];
        for _ in 0..total {
            let raw = indices.get(&[out_indices[axis]])? as i64;
            let resolved = if raw < 0 { raw + axis_len as i64 } else { raw };
            if resolved < 0 || resolved >= axis_len as i64 {
                return Err(Error::IndexOutOfRange { index: raw, length: axis_len as usize });
            }
            let mut src_indices = out_indices;
            src_indices[axis] = resolved;
            let value = self.get(&src_indices[..self.rank])?;
            let dest_idx: i64 = (0..self.rank).map(|i| out_indices[i] * new_strides[i]).sum();
            data[dest_idx as usize] = value;
            for i in (0..self.rank).rev() {
                out_indices[i] += 1;
                if (out_indices[i] as u32) < new_shape[i] {
                    break;
                }
                out_indices[i] = 0;
            }
        }

        Ok(Tensor {
            rank: self.rank,
            shape: new_shape,
            strides: new_strides,
            offset: 0,
            size: total,
            owns_data: true,
            storage: Storage::Host(Rc::new(RefCell::new(data))),
        })
    }

    /// Materializes a fresh, owned, contiguous copy if `self` isn't already canonical
    /// row-major.
    pub fn ensure_contiguous(&self) -> Result<Tensor> {
        if self.is_contiguous() {
            return Ok(self.view());
        }
        let total = self.size as usize;
        let mut data = vec![0.0f32; total];
        let mut indices = [0i64; 4];
        let std_strides = canonical_strides(&self.shape, self.rank);
        for dest_idx in 0..total {
            let value = self.get(&indices[..self.rank])?;
            data[dest_idx] = value;
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

fn shift_out_axis_zero(t: &mut Tensor) {
    t.rank -= 1;
    for i in 0..=t.rank {
        t.shape[i] = t.shape[i + 1];
        t.strides[i] = t.strides[i + 1];
    }
    t.size = t.shape[..t.rank].iter().product();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn transpose_swaps_shape_and_strides() {
        let t = Tensor::from_host(&[2, 3], vec![0.0; 6]);
        let tr = t.transpose(0, 1).unwrap();
        assert_eq!(tr.shape(), &[3, 2]);
        assert_eq!(tr.strides(), &[1, 3]);
    }

    #[test]
    fn reverse_then_get_reads_backwards() {
        let t = Tensor::from_host(&[3], vec![1.0, 2.0, 3.0]);
        let r = t.reverse(0).unwrap();
        assert_eq!(r.get(&[0]).unwrap(), 3.0);
        assert_eq!(r.get(&[2]).unwrap(), 1.0);
    }

    #[test]
    fn slice_negative_indices_count_from_end() {
        let t = Tensor::from_host(&[5], vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        let s = t.slice(0, -2, -1).unwrap();
        assert_eq!(s.shape(), &[1]);
        assert_eq!(s.get(&[0]).unwrap(), 3.0);
    }

    #[test]
    fn cat_concatenates_along_axis() {
        let a = Tensor::from_host(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let b = Tensor::from_host(&[2, 2], vec![5.0, 6.0, 7.0, 8.0]);
        let c = a.cat(&b, 0).unwrap();
        assert_eq!(c.shape(), &[4, 2]);
        assert_eq!(c.get(&[2, 0]).unwrap(), 5.0);
        assert_eq!(c.get(&[3, 1]).unwrap(), 8.0);
    }

    #[test]
    fn repeat_duplicates_contiguously() {
        let t = Tensor::from_host(&[2], vec![1.0, 2.0]);
        let r = t.repeat(3).unwrap();
        assert_eq!(r.shape(), &[3, 2]);
        assert_eq!(r.get(&[2, 1]).unwrap(), 2.0);
    }

    #[test]
    fn enclose_extrude_unextrude_round_trip() {
        let t = Tensor::from_host(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let enclosed = t.enclose().unwrap();
        assert_eq!(enclosed.shape(), &[1, 2, 2]);
        let extruded = t.extrude().unwrap();
        assert_eq!(extruded.shape(), &[2, 2, 1]);
        let back = extruded.unextrude().unwrap();
        assert_eq!(back.shape(), &[2, 2]);
    }

    #[test]
    fn enclose_extrude_reject_rank_four() {
        let t = Tensor::from_host(&[1, 1, 1, 1], vec![1.0]);
        assert!(t.enclose().is_err());
        assert!(t.extrude().is_err());
    }

    #[test]
    fn index_gathers_and_rejects_out_of_range() {
        let t = Tensor::from_host(&[3], vec![10.0, 20.0, 30.0]);
        let indices = Tensor::from_host(&[2], vec![-1.0, 0.0]);
        let gathered = t.index(&indices, 0).unwrap();
        assert_eq!(gathered.get(&[0]).unwrap(), 30.0);
        assert_eq!(gathered.get(&[1]).unwrap(), 10.0);

        let bad_indices = Tensor::from_host(&[1], vec![5.0]);
        assert!(t.index(&bad_indices, 0).is_err());
    }
}
