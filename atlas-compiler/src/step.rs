//! The compiled step types. Grounded in the tagged `step` union in `original_source/program.h`;
//! reshaped into an enum since Rust has no need for C's one-struct-fits-all layout.
//!
//! [`RawStep`] is the compiler's intermediate form: branch/call/variable targets are still
//! names, not resolved indices. [`Step`] is the final form the evaluator consumes, produced
//! by [`crate::compile::Compiler::finalize`].

use atlas_tensor::{BinaryOp, Tensor, UnaryOp};

/// A name as written in source, carrying both its workspace-qualified form (what gets
/// inserted into / looked up in the label and variable tries first) and its bare form (the
/// fallback lookup if the qualified name isn't found). Mirrors `branchName`/`branchBaseName`
/// and `var.name`/`var.baseName` in `original_source/program.h`, which are the same pointer
/// at two offsets into one allocation; here they're just two owned strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub qualified: String,
    pub unqualified: String,
}

impl QualifiedName {
    pub fn new(workspace: &str, raw: &str) -> Self {
        let qualified = if workspace.is_empty() { raw.to_string() } else { format!("{workspace}.{raw}") };
        Self { qualified, unqualified: raw.to_string() }
    }
}

/// Where a resolved variable lives: the sized uniform block (an offset/size pair into
/// `atlas_compute`'s variable uniform) or the unsized "big variable" table (an index into
/// `bigvarts`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarSlot {
    Sized { offset: u32, size: u32 },
    Big { index: u32 },
}

#[derive(Debug, Clone)]
pub enum LoadSource {
    /// `load'path'`: always load this literal path.
    Path(String),
    /// `load`: pop a tensor-valued filename off the stack at run time.
    Dynamic,
}

/// A not-yet-synthesized compute declaration, as parsed from a `c'...'...'...'...' a r c u`
/// command. Synthesis is deferred to `Compiler::finalize` because it needs the program's
/// assembled variable-uniform text, which isn't known until every `set` step has been seen.
pub struct RawComputeDecl {
    pub vertex_pre: String,
    pub vertex: String,
    pub fragment_pre: String,
    pub fragment_main: String,
    pub arg_count: u32,
    pub ret_count: u32,
    pub channels: atlas_tensor::Channels,
    pub reuse: bool,
}

/// A compiled compute declaration. The WGSL source is already synthesized
/// (`atlas_compute::shader::synthesize` is pure text assembly, unlike the original's
/// `makeCompute`, which needs a live GL context to link a program); building the actual
/// `wgpu::RenderPipeline` from this source is deferred to first use by the evaluator, which
/// is the first point a `Device` is available.
pub struct ComputeDecl {
    pub shader: atlas_compute::SynthesizedShader,
    pub reuse: bool,
}

/// A step whose branch/call/variable targets are still unresolved names.
#[derive(Debug)]
pub enum RawKind {
    TensorLiteral(Tensor),
    Compute(RawComputeDecl),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Minmax,
    Length,
    Reverse,
    Transpose,
    Slice,
    Shape,
    Size,
    Dup,
    Rep,
    Pop,
    Bury,
    Raise,
    First,
    Last,
    Enclose,
    Extrude,
    Unextrude,
    Cat,
    MatMul,
    Translate,
    Rot,
    Proj,
    Ortho,
    Reshape,
    Index,
    Sort,
    SetVar { name: QualifiedName, size: u32 },
    GetVar { name: QualifiedName },
    If { target: QualifiedName },
    Ifn { target: QualifiedName },
    Call { target: QualifiedName },
    Return,
    Quit,
    Load(LoadSource),
    Eval,
    Img(String),
    Gltf(String),
    TextBufferView,
    Kettle,
    Unkettle,
    Texture,
    Print,
    PrintLine,
    PrintString,
    ToString,
    Keys,
    Input,
    Gamepad,
    GamepadRumble,
    TextInput,
    WindowSize,
    TimeDelta,
    Backface,
    Depth,
    Additive,
    Fullscreen,
    TransferStart,
    TransferEnd,
    Cls,
    Continue,
}

/// A fully resolved step, as the evaluator walks it. `If`/`Ifn`/`Call` carry the target step
/// index directly (the original stores this in `branch`, replacing the name during
/// `finalize`); `SetVar`/`GetVar` carry a resolved [`VarSlot`].
#[derive(Debug)]
pub enum StepKind {
    TensorLiteral(Tensor),
    Compute { index: usize },
    Binary(BinaryOp),
    Unary(UnaryOp),
    Minmax,
    Length,
    Reverse,
    Transpose,
    Slice,
    Shape,
    Size,
    Dup,
    Rep,
    Pop,
    Bury,
    Raise,
    First,
    Last,
    Enclose,
    Extrude,
    Unextrude,
    Cat,
    MatMul,
    Translate,
    Rot,
    Proj,
    Ortho,
    Reshape,
    Index,
    Sort,
    SetVar { name: String, slot: VarSlot },
    GetVar { name: String, slot: VarSlot },
    If { target: usize },
    Ifn { target: usize },
    Call { target: usize },
    Return,
    Quit,
    Load(LoadSource),
    Eval,
    Img(String),
    Gltf(String),
    TextBufferView,
    Kettle,
    Unkettle,
    Texture,
    Print,
    PrintLine,
    PrintString,
    ToString,
    Keys,
    Input,
    Gamepad,
    GamepadRumble,
    TextInput,
    WindowSize,
    TimeDelta,
    Backface,
    Depth,
    Additive,
    Fullscreen,
    TransferStart,
    TransferEnd,
    Cls,
    Continue,
}

pub struct RawStep {
    pub kind: RawKind,
    pub filename: String,
    pub linenum: u32,
    pub commandnum: u32,
}

/// A resolved step, annotated with the source location every error path in the evaluator
/// reports (`file:line command n: ...`).
pub struct Step {
    pub kind: StepKind,
    pub filename: String,
    pub linenum: u32,
    pub commandnum: u32,
}
