//! The two-pass compiler driver: tokenize + parse every command into a flat raw-step list
//! (handling `include`/`workspace`/labels as it goes), then collect variables and resolve
//! every label/variable/call/compute reference into its final form.
//!
//! Grounded in `addProgram`/`addStep`/`finalize` in `original_source/program.c`. The original
//! is re-entrant via `include` and keeps a single mutable `program` being appended to; here
//! `Compiler` plays that role but the end result is an immutable `Program`, matching spec.md
//! §4.5's "a program's compile emits a flat step array; no AST is retained."

use atlas_trie::Trie;

use crate::error::{Detail, Located, Result};
use crate::keyword::{parse_command, ParsedCommand};
use crate::lexer::{preprocess_compute_commands, remove_comments, tokenize};
use crate::program::Program;
use crate::step::{ComputeDecl, LoadSource, QualifiedName, RawKind, RawStep, Step, StepKind, VarSlot};
use crate::varblock::VarBlock;

const MAX_INCLUDED_FILES: usize = 65536;

/// Supplies the text of an `include'path'`-referenced source file. Lets tests compile
/// multi-file programs without touching the real filesystem; `FsLoader` is the production
/// implementation, reading straight from disk like `addProgramFromFile`.
pub trait SourceLoader {
    fn load(&self, path: &str) -> std::result::Result<String, String>;
}

/// Reads include targets from disk, matching `fileExists`/`addProgramFromFile`.
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> std::result::Result<String, String> {
        std::fs::read_to_string(path).map_err(|e| e.to_string())
    }
}

struct Compiler<'a, L: SourceLoader> {
    loader: &'a L,
    workspace: String,
    raw_steps: Vec<RawStep>,
    labels: Trie,
    included: Vec<String>,
}

/// Compiles `source` (the contents of `main_filename`) into a [`Program`].
pub fn compile<L: SourceLoader>(loader: &L, main_filename: &str, source: &str) -> Result<Program> {
    tracing::debug!("compiling {main_filename}");
    let mut compiler = Compiler { loader, workspace: String::new(), raw_steps: Vec::new(), labels: Trie::new(), included: Vec::new() };
    compiler.add_program(main_filename, source)?;
    let program = compiler.finalize()?;
    tracing::debug!(
        steps = program.steps.len(),
        computes = program.computes.len(),
        var_floats = program.var_floats,
        "compiled"
    );
    Ok(program)
}

impl<'a, L: SourceLoader> Compiler<'a, L> {
    fn add_program(&mut self, filename: &str, source: &str) -> Result<()> {
        let stripped = remove_comments(source);
        let located = |linenum, commandnum, detail| Located { filename: filename.to_string(), linenum, commandnum, detail };
        let preprocessed = preprocess_compute_commands(&stripped).map_err(|d| located(0, 0, d))?;

        for command in tokenize(&preprocessed) {
            if let Some(path) = command.text.strip_prefix("include'") {
                let path = path.strip_suffix('\'').ok_or_else(|| {
                    located(command.linenum, command.commandnum, Detail::UnmatchedQuote("include statement"))
                })?;
                if path.is_empty() {
                    return Err(located(command.linenum, command.commandnum, Detail::Empty("include statement")));
                }
                let included_source = self.loader.load(path).map_err(|e| {
                    located(command.linenum, command.commandnum, Detail::Include(path.to_string(), e))
                })?;
                tracing::trace!("including {path}");
                self.workspace.clear();
                self.add_program(path, &included_source)?;
                self.workspace.clear();
                self.included.push(path.to_string());
                if self.included.len() >= MAX_INCLUDED_FILES {
                    return Err(located(command.linenum, command.commandnum, Detail::TooManyFilenames));
                }
                continue;
            }

            let parsed = parse_command(&self.workspace, &command.text)
                .map_err(|d| located(command.linenum, command.commandnum, d))?;
            match parsed {
                ParsedCommand::Workspace(name) => self.workspace = name,
                ParsedCommand::Label(name) => {
                    if self.labels.search(&name.qualified).is_some() {
                        return Err(located(
                            command.linenum,
                            command.commandnum,
                            Detail::DuplicateLabel(name.qualified),
                        ));
                    }
                    self.labels.insert(&name.qualified, self.raw_steps.len() as u32);
                }
                ParsedCommand::Step(kind) => {
                    self.raw_steps.push(RawStep {
                        kind,
                        filename: filename.to_string(),
                        linenum: command.linenum,
                        commandnum: command.commandnum,
                    });
                }
            }
        }
        Ok(())
    }

    fn finalize(self) -> Result<Program> {
        let Compiler { raw_steps, labels, .. } = self;
        let mut vars = VarBlock::new();
        for step in &raw_steps {
            match &step.kind {
                RawKind::SetVar { name, size } => {
                    vars.declare(&name.qualified, *size)
                        .map_err(|d| located(step, d))?;
                }
                RawKind::Call { target } => {
                    if let Some((base, size)) = short_form_set(&target.unqualified) {
                        if matches!(size, 1 | 2 | 3 | 4 | 16) {
                            let qualified = QualifiedName::new(&workspace_of(target), &base);
                            vars.declare(&qualified.qualified, size).map_err(|d| located(step, d))?;
                        }
                    }
                }
                _ => {}
            }
        }

        let uniforms = vars.uniform_declaration();
        let mut computes = Vec::new();
        let mut steps = Vec::with_capacity(raw_steps.len());

        for step in raw_steps {
            let kind = resolve_kind(&labels, step.kind, &vars, &uniforms, &mut computes).map_err(|d| Located {
                filename: step.filename.clone(),
                linenum: step.linenum,
                commandnum: step.commandnum,
                detail: d,
            })?;
            steps.push(Step { kind, filename: step.filename, linenum: step.linenum, commandnum: step.commandnum });
        }

        Ok(Program { steps, computes, var_floats: vars.total_floats(), bigvar_names: vars.bigvar_names().to_vec() })
    }
}

fn resolve_kind(
    labels: &Trie,
    kind: RawKind,
    vars: &VarBlock,
    uniforms: &str,
    computes: &mut Vec<ComputeDecl>,
) -> std::result::Result<StepKind, Detail> {
        Ok(match kind {
            RawKind::TensorLiteral(t) => StepKind::TensorLiteral(t),
            RawKind::Compute(decl) => {
                let fragments = atlas_compute::ComputeFragments {
                    vertex_pre: &decl.vertex_pre,
                    vertex: &decl.vertex,
                    fragment_pre: &decl.fragment_pre,
                    fragment_main: &decl.fragment_main,
                };
                let shader = atlas_compute::synthesize(&fragments, uniforms, decl.arg_count, decl.ret_count, decl.channels)?;
                let index = computes.len();
                computes.push(ComputeDecl { shader, reuse: decl.reuse });
                StepKind::Compute { index }
            }
            RawKind::Binary(op) => StepKind::Binary(op),
            RawKind::Unary(op) => StepKind::Unary(op),
            RawKind::Minmax => StepKind::Minmax,
            RawKind::Length => StepKind::Length,
            RawKind::Reverse => StepKind::Reverse,
            RawKind::Transpose => StepKind::Transpose,
            RawKind::Slice => StepKind::Slice,
            RawKind::Shape => StepKind::Shape,
            RawKind::Size => StepKind::Size,
            RawKind::Dup => StepKind::Dup,
            RawKind::Rep => StepKind::Rep,
            RawKind::Pop => StepKind::Pop,
            RawKind::Bury => StepKind::Bury,
            RawKind::Raise => StepKind::Raise,
            RawKind::First => StepKind::First,
            RawKind::Last => StepKind::Last,
            RawKind::Enclose => StepKind::Enclose,
            RawKind::Extrude => StepKind::Extrude,
            RawKind::Unextrude => StepKind::Unextrude,
            RawKind::Cat => StepKind::Cat,
            RawKind::MatMul => StepKind::MatMul,
            RawKind::Translate => StepKind::Translate,
            RawKind::Rot => StepKind::Rot,
            RawKind::Proj => StepKind::Proj,
            RawKind::Ortho => StepKind::Ortho,
            RawKind::Reshape => StepKind::Reshape,
            RawKind::Index => StepKind::Index,
            RawKind::Sort => StepKind::Sort,
            RawKind::SetVar { name, .. } => {
                let slot = vars.slot(&name.qualified).or_else(|| vars.slot(&name.unqualified));
                let slot = slot.ok_or_else(|| Detail::UndefinedReference(name.qualified.clone()))?;
                StepKind::SetVar { name: name.qualified, slot }
            }
            RawKind::GetVar { name } => {
                let slot = vars.slot(&name.qualified).or_else(|| vars.slot(&name.unqualified));
                let slot = slot.ok_or_else(|| Detail::UndefinedReference(name.qualified.clone()))?;
                StepKind::GetVar { name: name.qualified, slot }
            }
            RawKind::If { target } => match resolve_branch(labels, vars, &target)? {
                BranchResolution::Label(index) => StepKind::If { target: index },
                BranchResolution::Var(name, slot) => StepKind::GetVar { name, slot },
            },
            RawKind::Ifn { target } => match resolve_branch(labels, vars, &target)? {
                BranchResolution::Label(index) => StepKind::Ifn { target: index },
                BranchResolution::Var(name, slot) => StepKind::GetVar { name, slot },
            },
            RawKind::Call { target } => {
                if let Some((base, size)) = short_form_set(&target.unqualified) {
                    if matches!(size, 1 | 2 | 3 | 4 | 16) {
                        let qualified = QualifiedName::new(&workspace_of(&target), &base);
                        if let Some(slot) = vars.slot(&qualified.qualified) {
                            return Ok(StepKind::SetVar { name: qualified.qualified, slot });
                        }
                    }
                }
                match resolve_branch(labels, vars, &target)? {
                    BranchResolution::Label(index) => StepKind::Call { target: index },
                    BranchResolution::Var(name, slot) => StepKind::GetVar { name, slot },
                }
            }
            RawKind::Return => StepKind::Return,
            RawKind::Quit => StepKind::Quit,
            RawKind::Load(LoadSource::Path(p)) => StepKind::Load(LoadSource::Path(p)),
            RawKind::Load(LoadSource::Dynamic) => StepKind::Load(LoadSource::Dynamic),
            RawKind::Eval => StepKind::Eval,
            RawKind::Img(p) => StepKind::Img(p),
            RawKind::Gltf(p) => StepKind::Gltf(p),
            RawKind::TextBufferView => StepKind::TextBufferView,
            RawKind::Kettle => StepKind::Kettle,
            RawKind::Unkettle => StepKind::Unkettle,
            RawKind::Texture => StepKind::Texture,
            RawKind::Print => StepKind::Print,
            RawKind::PrintLine => StepKind::PrintLine,
            RawKind::PrintString => StepKind::PrintString,
            RawKind::ToString => StepKind::ToString,
            RawKind::Keys => StepKind::Keys,
            RawKind::Input => StepKind::Input,
            RawKind::Gamepad => StepKind::Gamepad,
            RawKind::GamepadRumble => StepKind::GamepadRumble,
            RawKind::TextInput => StepKind::TextInput,
            RawKind::WindowSize => StepKind::WindowSize,
            RawKind::TimeDelta => StepKind::TimeDelta,
            RawKind::Backface => StepKind::Backface,
            RawKind::Depth => StepKind::Depth,
            RawKind::Additive => StepKind::Additive,
            RawKind::Fullscreen => StepKind::Fullscreen,
            RawKind::TransferStart => StepKind::TransferStart,
            RawKind::TransferEnd => StepKind::TransferEnd,
            RawKind::Cls => StepKind::Cls,
            RawKind::Continue => StepKind::Continue,
        })
}

enum BranchResolution {
    Label(usize),
    /// The target wasn't a label; it resolved to a variable instead, so the step is
    /// rewritten into a `get`. Carries the resolved name and slot directly.
    Var(String, VarSlot),
}

/// `if`/`ifn`/`call`: look up the qualified name in labels, then the bare name in labels.
/// If neither resolves, fall back to a variable lookup (qualified, then bare) and promote
/// the step to a `get` instead of erroring — per the reference-resolution rule that a
/// branch/call target which turns out to name a variable is treated as reading it.
fn resolve_branch(labels: &Trie, vars: &VarBlock, target: &QualifiedName) -> std::result::Result<BranchResolution, Detail> {
    if let Some(index) = labels.search(&target.qualified).or_else(|| labels.search(&target.unqualified)) {
        return Ok(BranchResolution::Label(index as usize));
    }
    if let Some(slot) = vars.slot(&target.qualified).or_else(|| vars.slot(&target.unqualified)) {
        return Ok(BranchResolution::Var(target.qualified.clone(), slot));
    }
    Err(Detail::UndefinedReference(target.qualified.clone()))
}

fn located(step: &RawStep, detail: Detail) -> Located {
    Located { filename: step.filename.clone(), linenum: step.linenum, commandnum: step.commandnum, detail }
}

/// Recovers the workspace prefix a `QualifiedName` was built with, so the short-form `set`
/// rewrite can re-qualify its bare variable name the same way `set'name' N` would.
fn workspace_of(name: &QualifiedName) -> String {
    name.qualified
        .strip_suffix(&name.unqualified)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .unwrap_or("")
        .to_string()
}

/// Recognizes the "short-form set" rewrite: a bare call whose text is `name = N` with `N` an
/// unsigned integer, per spec.md §4.5 point 4 / Open Question decision 3.
fn short_form_set(text: &str) -> Option<(String, u32)> {
    let eq = text.find('=')?;
    let name = text[..eq].trim();
    let num = text[eq + 1..].trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    let size: u32 = num.parse().ok()?;
    Some((name.to_string(), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct NullLoader;
    impl SourceLoader for NullLoader {
        fn load(&self, path: &str) -> std::result::Result<String, String> {
            Err(format!("no such file: {path}"))
        }
    }

    struct MapLoader(HashMap<&'static str, &'static str>);
    impl SourceLoader for MapLoader {
        fn load(&self, path: &str) -> std::result::Result<String, String> {
            self.0.get(path).map(|s| s.to_string()).ok_or_else(|| "missing".to_string())
        }
    }

    #[test]
    fn compiles_simple_arithmetic_program() {
        let program = compile(&NullLoader, "main", "1; 2; +").unwrap();
        assert_eq!(program.steps.len(), 3);
        assert!(matches!(program.steps[2].kind, StepKind::Binary(_)));
    }

    #[test]
    fn resolves_forward_label_branch() {
        let program = compile(&NullLoader, "main", "if'skip'; 1; l'skip'; 2").unwrap();
        match &program.steps[0].kind {
            StepKind::If { target } => assert_eq!(*target, 2),
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn errors_on_undefined_label() {
        let err = compile(&NullLoader, "main", "if'nope'").unwrap_err();
        assert!(matches!(err.detail, Detail::UndefinedReference(_)));
    }

    #[test]
    fn errors_on_duplicate_label() {
        let err = compile(&NullLoader, "main", "l'x'; l'x'").unwrap_err();
        assert!(matches!(err.detail, Detail::DuplicateLabel(_)));
    }

    #[test]
    fn workspace_qualifies_labels_and_resets_on_include() {
        let mut files = HashMap::new();
        files.insert("inc.atl", "l'helper'; 1");
        let loader = MapLoader(files);
        let program = compile(&loader, "main", "workspace'ns'; include'inc.atl'; helper").unwrap();
        // The included label is unqualified (workspace reset on entry), so the bare call
        // from inside main's (restored-to-empty) workspace resolves to it directly.
        assert_eq!(program.steps.len(), 2);
    }

    #[test]
    fn set_and_get_share_a_resolved_slot() {
        let program = compile(&NullLoader, "main", "1; set'x' 1; get'x'").unwrap();
        let set_slot = match &program.steps[1].kind {
            StepKind::SetVar { slot, .. } => *slot,
            _ => panic!("expected set"),
        };
        let get_slot = match &program.steps[2].kind {
            StepKind::GetVar { slot, .. } => *slot,
            _ => panic!("expected get"),
        };
        assert_eq!(set_slot, get_slot);
    }

    #[test]
    fn short_form_set_rewrites_bare_call() {
        let program = compile(&NullLoader, "main", "4; x = 4").unwrap();
        assert!(matches!(program.steps[1].kind, StepKind::SetVar { .. }));
    }

    #[test]
    fn compute_declaration_synthesizes_a_shader() {
        let program = compile(&NullLoader, "main", "c''''ret[0] = a(t);' 1 1 0 0").unwrap();
        assert_eq!(program.computes.len(), 1);
        assert!(matches!(program.steps[0].kind, StepKind::Compute { index: 0 }));
    }
}
