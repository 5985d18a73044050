use thiserror::Error;

/// Every compiler error carries the source location of the offending command, formatted by
/// `Display` as `file:line command n: <detail>`, matching every `error(...)` call site in
/// `original_source/program.c`'s `addStep`/`addProgram`/`finalize`.
#[derive(Debug, Error)]
#[error("{filename}:{linenum} command {commandnum}: {detail}")]
pub struct Located {
    pub filename: String,
    pub linenum: u32,
    pub commandnum: u32,
    pub detail: Detail,
}

#[derive(Debug, Error)]
pub enum Detail {
    #[error("backslash in shader! This is almost certainly an error!")]
    BackslashInShader,
    #[error("unmatched quote in {0}")]
    UnmatchedQuote(&'static str),
    #[error("empty {0}")]
    Empty(&'static str),
    #[error("extra characters after {0}")]
    ExtraCharacters(&'static str),
    #[error("expected '[' to start tensor definition")]
    ExpectedOpenBracket,
    #[error("expected ']' to close tensor definition")]
    ExpectedCloseBracket,
    #[error("tensor exceeds maximum supported dimensions (4D)")]
    TensorTooDeep,
    #[error("failed to parse number in tensor")]
    BadNumber,
    #[error("inconsistent tensor shape detected")]
    InconsistentShape,
    #[error("incomplete tensor shape definition")]
    IncompleteShape,
    #[error("unexpected characters after tensor definition")]
    TrailingCharacters,
    #[error("mismatch in expected and actual number of tensor elements")]
    ElementCountMismatch,
    #[error("malformed compute statement")]
    MalformedCompute,
    #[error("compute created with channels not equal 0, 1, 4, 10, or 40")]
    BadComputeChannels,
    #[error("compute created with more than 4 arguments. The maximum is 4")]
    TooManyComputeArguments,
    #[error("compute created with a bad return count, must be 1-4")]
    BadComputeReturnCount,
    #[error("{0}")]
    Shader(#[from] atlas_compute::Error),
    #[error("malformed set statement")]
    MalformedSet,
    #[error("invalid var size in set statement")]
    InvalidVarSize,
    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),
    #[error("undefined reference to '{0}'")]
    UndefinedReference(String),
    #[error("could not read include '{0}': {1}")]
    Include(String, String),
    #[error("too many included files")]
    TooManyFilenames,
}

pub type Result<T> = std::result::Result<T, Located>;
