//! Host-memory elementwise arithmetic, grounded in spec §4.3's elementwise/unary/minmax/
//! length contracts (the original keeps these inline in the evaluator's step dispatch; here
//! they are `Tensor` methods so the evaluator stays a thin dispatcher).

use crate::error::{Error, Result};
use crate::tensor::{canonical_strides, Storage, Tensor};

#[derive(Debug, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum UnaryOp {
    Sin,
    Cos,
    Floor,
    Ceil,
}

impl UnaryOp {
    fn apply(self, x: f32) -> f32 {
        match self {
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Floor => x.floor(),
            UnaryOp::Ceil => x.ceil(),
        }
    }
}

impl Tensor {
    /// Elementwise binary operation; both operands must share rank and shape. Produces a
    /// fresh, owned, contiguous tensor.
    pub fn binary(&self, other: &Tensor, op: BinaryOp) -> Result<Tensor> {
        if self.rank != other.rank || self.shape() != other.shape() {
            return Err(Error::ShapeMismatch("elementwise op requires identical rank and shape"));
        }
        let total = self.size as usize;
        let mut data = vec![0.0f32; total];
        let mut indices = [0i64; 4];
        for out in data.iter_mut() {
            let a = self.get(&indices[..self.rank])?;
            let b = other.get(&indices[..self.rank])?;
            *out = op.apply(a, b);
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
            strides: canonical_strides(&self.shape, self.rank),
            offset: 0,
            size: self.size,
            owns_data: true,
            storage: Storage::Host(std::rc::Rc::new(std::cell::RefCell::new(data))),
        })
    }

    /// Applies a unary function in place, writing through this tensor's own view into its
    /// shared storage (so other views of the same storage observe the change too, matching
    /// the original's in-place semantics).
    pub fn unary_in_place(&self, op: UnaryOp) -> Result<()> {
        if self.is_in_flight() {
            return Err(Error::TensorInFlight);
        }
        let data = self.host_data();
        let mut data = data.borrow_mut();
        let total = self.size as usize;
        let mut indices = [0i64; 4];
        for _ in 0..total {
            let idx = self.linear_index(&indices[..self.rank]) as usize;
            data[idx] = op.apply(data[idx]);
            for i in (0..self.rank).rev() {
                indices[i] += 1;
                if (indices[i] as u32) < self.shape[i] {
                    break;
                }
                indices[i] = 0;
            }
        }
        Ok(())
    }

    /// Returns a length-2 vector `(min, max)`; errors on an empty tensor.
    pub fn minmax(&self) -> Result<Tensor> {
        if self.size == 0 {
            return Err(Error::EmptyTensor);
        }
        let total = self.size as usize;
        let mut indices = [0i64; 4];
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for _ in 0..total {
            let v = self.get(&indices[..self.rank])?;
            min = min.min(v);
            max = max.max(v);
            for i in (0..self.rank).rev() {
                indices[i] += 1;
                if (indices[i] as u32) < self.shape[i] {
                    break;
                }
                indices[i] = 0;
            }
        }
        Ok(Tensor::vector(vec![min, max]))
    }

    /// Euclidean norm of a rank-1 vector.
    pub fn length(&self) -> Result<Tensor> {
        if self.rank != 1 {
            return Err(Error::NotAVector);
        }
        let mut sum = 0.0f32;
        for i in 0..self.shape[0] as i64 {
            let v = self.get(&[i])?;
            sum += v * v;
        }
        Ok(Tensor::scalar(sum.sqrt()))
    }

    /// Pushes a rank-1 vector holding this tensor's shape.
    pub fn shape_vector(&self) -> Tensor {
        Tensor::vector(self.shape().iter().map(|&d| d as f32).collect())
    }

    /// Sorts a rank-1 tensor ascending, producing a fresh owned vector.
    pub fn sort(&self) -> Result<Tensor> {
        if self.rank != 1 {
            return Err(Error::NotAVector);
        }
        let mut data = Vec::with_capacity(self.size as usize);
        for i in 0..self.shape[0] as i64 {
            data.push(self.get(&[i])?);
        }
        data.sort_by(|a, b| a.total_cmp(b));
        Ok(Tensor::vector(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn binary_add_requires_matching_shape() {
        let a = Tensor::from_host(&[2], vec![1.0, 2.0]);
        let b = Tensor::from_host(&[3], vec![1.0, 2.0, 3.0]);
        assert!(a.binary(&b, BinaryOp::Add).is_err());
    }

    #[test]
    fn binary_add_sums_elementwise() {
        let a = Tensor::from_host(&[2], vec![1.0, 2.0]);
        let b = Tensor::from_host(&[2], vec![10.0, 20.0]);
        let c = a.binary(&b, BinaryOp::Add).unwrap();
        assert_eq!(c.get(&[0]).unwrap(), 11.0);
        assert_eq!(c.get(&[1]).unwrap(), 22.0);
    }

    #[test]
    fn unary_floor_mutates_in_place() {
        let t = Tensor::from_host(&[2], vec![1.7, 2.2]);
        t.unary_in_place(UnaryOp::Floor).unwrap();
        assert_eq!(t.get(&[0]).unwrap(), 1.0);
        assert_eq!(t.get(&[1]).unwrap(), 2.0);
    }

    #[test]
    fn minmax_and_length() {
        let t = Tensor::from_host(&[3], vec![3.0, -1.0, 2.0]);
        let mm = t.minmax().unwrap();
        assert_eq!(mm.get(&[0]).unwrap(), -1.0);
        assert_eq!(mm.get(&[1]).unwrap(), 3.0);

        let v = Tensor::from_host(&[2], vec![3.0, 4.0]);
        assert_eq!(v.length().unwrap().get(&[]).unwrap(), 5.0);
    }
}
