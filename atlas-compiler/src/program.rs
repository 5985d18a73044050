//! The compiler's output: a flat, fully resolved step array plus the metadata the evaluator
//! needs to allocate its variable block and compute pipelines. Mirrors the `program` struct in
//! `original_source/program.h`, minus the fields (`labels`/`vars`/`varNames`/...) that only
//! existed to support compilation itself and have no role once resolution is done.

use crate::step::{ComputeDecl, Step};

/// A compiled Atlas program, ready for the evaluator to run.
pub struct Program {
    /// The flat instruction stream. `If`/`Ifn`/`Call` steps carry resolved target indices
    /// into this same vector.
    pub steps: Vec<Step>,
    /// Every `compute` step's synthesized shader, indexed by `StepKind::Compute::index`.
    pub computes: Vec<ComputeDecl>,
    /// Total size (in `f32`s) of the packed uniform block the evaluator must allocate for
    /// sized variables.
    pub var_floats: u32,
    /// Names of every unsized "big" variable, in declaration order; the evaluator allocates
    /// one tensor slot per entry and resolves `VarSlot::Big` indices against this vector.
    pub bigvar_names: Vec<String>,
}
