use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("WGPU error: {0}")]
    BackendError(#[from] atlas_wgpu::Error),
    #[error("tensor stack underflow")]
    StackUnderflow,
    #[error("shapes don't match for {0}")]
    ShapeMismatch(&'static str),
    #[error("axis {axis} out of bounds for rank {rank}")]
    AxisOutOfBounds { axis: usize, rank: usize },
    #[error("slice indices out of range: start={start}, end={end}, length={length}")]
    SliceOutOfRange { start: i64, end: i64, length: i64 },
    #[error("new shape size {new_size} does not match tensor size {old_size}")]
    ReshapeSizeMismatch { new_size: usize, old_size: usize },
    #[error("cannot reduce rank of a tensor with rank 0")]
    RankZero,
    #[error("cannot increase rank of a tensor with rank 4")]
    RankFour,
    #[error("repeat count must be greater than 0")]
    ZeroRepeat,
    #[error("cannot take min/max of an empty tensor")]
    EmptyTensor,
    #[error("length requires a rank-1 tensor")]
    NotAVector,
    #[error("index {index} out of range for axis of length {length}")]
    IndexOutOfRange { index: i64, length: usize },
    #[error("attempt to read a tensor that is in flight to host memory")]
    TensorInFlight,
    #[error("matmul requires b.shape[1] == a.shape[0]")]
    MatmulShapeMismatch,
}

pub type Result<T> = std::result::Result<T, self::Error>;
