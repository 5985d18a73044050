use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tensor error: {0}")]
    Tensor(#[from] atlas_tensor::Error),
    #[error("WGPU error: {0}")]
    Backend(#[from] atlas_wgpu::Error),
    #[error("a compute was called with {arg_count} arguments and {ret_count} returns, but the stack size is only {stack_size}")]
    StackTooShallow { arg_count: usize, ret_count: usize, stack_size: usize },
    #[error("the shape for a compute was not a rank 1 tensor")]
    ShapeNotRank1,
    #[error("a compute was run with a non-scalar vertex count")]
    VertexCountNotScalar,
    #[error("attempt to run a compute statement into texture not of rank 3 but of rank {0}")]
    ReuseNotRank3(usize),
    #[error("attempt to run a compute statement into a texture with a bad number of channels {0}")]
    ReuseChannelMismatch(u32),
    #[error("a compute declares more than 6 arguments, which has no sampler binding slot")]
    TooManyArguments,
    #[error("a compute declares zero or more than 4 returns")]
    BadReturnCount,
    #[error("attempt to run a reusing compute statement into an invalid target: {0}")]
    InvalidReuseTarget(&'static str),
}

pub type Result<T> = std::result::Result<T, self::Error>;
