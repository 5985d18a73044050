//! Atlas: a stack-oriented, GPU-accelerated array language. This crate compiles Atlas source
//! with `atlas-compiler` and drives the resulting program with [`Evaluator`], the
//! counterpart of `runProgram` in `original_source/program.c`.
//!
//! ## Modules
//!
//! - `eval`: the step-dispatch loop.
//! - `error`: the evaluator's runtime error type.
//! - `host`: host input state and outbound host commands.
//! - `print`: the boxed tensor pretty-printer backing `print`/`printLine`.
//! - `io`: ambient adapters (image/glTF loading) that delegate to external crates.

mod error;
mod eval;
mod host;
mod io;
mod print;

pub use error::{Detail, Result, RuntimeError};
pub use eval::Evaluator;
pub use host::{HostCommand, HostInput};
