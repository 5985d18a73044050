//! The evaluator's runtime error type. Every error carries the source location of the step
//! that raised it, formatted by `Display` exactly like `atlas_compiler::Located`'s
//! `file:line command n: <detail>`, matching every `error(...)` call site in
//! `original_source/program.c`'s `runProgram`.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("{filename}:{linenum} command {commandnum}: {detail}")]
pub struct RuntimeError {
    pub filename: String,
    pub linenum: u32,
    pub commandnum: u32,
    pub detail: Detail,
}

#[derive(Debug, Error)]
pub enum Detail {
    #[error("{0}")]
    Tensor(#[from] atlas_tensor::Error),
    #[error("{0}")]
    Compute(#[from] atlas_compute::Error),
    #[error("{0}")]
    Kettle(#[from] atlas_kettle::Error),
    #[error("{0}")]
    Gpu(#[from] atlas_wgpu::Error),
    #[error("attempt to operate on an empty stack")]
    StackUnderflow,
    #[error("attempt to return with an empty return stack")]
    EmptyReturnStack,
    #[error("attempt to move past the end of the stack")]
    StackIndexOutOfRange,
    #[error("expected a scalar parameter")]
    NotScalar,
    #[error("expected a rank-1 vector parameter")]
    NotVector,
    #[error("a compute statement's shape parameter must have rank 1 and at most 4 elements")]
    BadComputeShape,
    #[error("attempt to run a compute statement with a non-scalar vertex count")]
    NonScalarVertexCount,
    #[error("unknown compute index {0}, this is a compiler bug")]
    UnknownCompute(usize),
    #[error("unknown variable slot, this is a compiler bug")]
    UnknownVarSlot,
    #[error("could not read '{0}': {1}")]
    Io(String, String),
    #[error("could not decode image '{0}': {1}")]
    Image(String, String),
    #[error("could not import glTF scene '{0}': {1}")]
    Gltf(String, String),
    #[error("could not compile loaded program '{0}': {1}")]
    Reload(String, String),
    #[error("attempt to read a partially-loaded kettle file before it finished unkettling")]
    KettleNotReady,
    #[error("a texture step requires a channeled GPU tensor")]
    NotAChanneledTexture,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    pub fn new(filename: &str, linenum: u32, commandnum: u32, detail: impl Into<Detail>) -> Self {
        Self { filename: filename.to_string(), linenum, commandnum, detail: detail.into() }
    }
}
