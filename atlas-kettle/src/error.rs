use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("kettle: stack underflow, requested {requested} tensors but stack has {available}")]
    StackUnderflow { requested: u32, available: usize },
    #[error("kettle: could not open {path} for writing: {source}")]
    Write { path: String, #[source] source: std::io::Error },
    #[error("unkettle: could not open {path}: {source}")]
    Open { path: String, source: std::io::Error },
    #[error("kettle/unkettle: I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unkettle: invalid magic number in {0}")]
    InvalidMagic(String),
    #[error("unkettle: truncated or corrupt file (expected {expected} bytes, decompressed {actual})")]
    Truncated { expected: u32, actual: u32 },
    #[error("unkettle: called with no file open")]
    NotOpen,
    #[error("unkettle: inflate failed: {0}")]
    Inflate(#[from] flate2::DecompressError),
    #[error(transparent)]
    Tensor(#[from] atlas_tensor::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
