//! Compiles Atlas source text into a flat, resolved step array.
//!
//! A program is tokenized and parsed into a raw step list (handling `include`, `workspace`
//! namespacing, and label collection along the way), then a second pass collects every `set`
//! into a packed variable layout and resolves every label/variable/call/compute reference
//! against it, synthesizing each compute step's WGSL shader pair as it goes.
//!
//! Grounded in `addProgram`/`addStep`/`finalize` in `original_source/program.c` and
//! `program.h`'s `program`/`step` structs.
//!
//! ## Modules
//!
//! - `lexer`: comment stripping, compute-fragment escaping, command tokenizing.
//! - `literal`: tensor/scalar/string literal parsing.
//! - `keyword`: single-command parsing against the keyword table.
//! - `step`: the raw and resolved step types.
//! - `varblock`: variable layout collection.
//! - `compile`: the two-pass compiler driver.
//! - `program`: the compiled program result type.
//! - `error`: error and result types shared across the crate.

mod compile;
mod error;
mod keyword;
mod lexer;
mod literal;
mod program;
mod step;
mod varblock;

pub use compile::{compile, FsLoader, SourceLoader};
pub use error::{Detail, Located, Result};
pub use program::Program;
pub use step::{ComputeDecl, LoadSource, Step, StepKind, VarSlot};
