//! The step-dispatch loop: the Rust counterpart of `runProgram` in
//! `original_source/program.c`. One [`Evaluator`] owns the program, the tensor stack, the
//! compiled compute pipelines, the program-variable uniform block, and the handful of
//! pieces of host state (`set`/`get`, `input`, `load`) the original keeps as process
//! globals.
//!
//! `Tensor` carries no `Clone`, and a `StepKind` can embed one directly (`TensorLiteral`), so
//! a naive `match &self.program.steps[self.pc].kind { ... }` would hold an immutable borrow
//! of `self.program` alive for the whole match body — which conflicts with the `&mut self`
//! calls a `Load`/`Eval` arm needs to make to replace `self.program` itself. [`resolve`]
//! breaks that borrow early: it converts the borrowed step into a fully owned [`Op`] (using
//! `Tensor::view` in place of a clone) in one expression, so the borrow of `self.program`
//! ends before `execute_step`'s body runs.

use std::collections::HashMap;
use std::time::Duration;

use atlas_compiler::{compile, FsLoader, LoadSource, Program, StepKind, VarSlot};
use atlas_compute::{execute as execute_compute, Compute, RenderState};
use atlas_kettle::{kettle, Unkettle};
use atlas_tensor::{BinaryOp, Tensor, TensorStack, UnaryOp};
use atlas_wgpu::Device;

use crate::error::{Detail, Result, RuntimeError};
use crate::host::{HostCommand, HostInput};
use crate::io;
use crate::print::format_tensor;

/// Wall-clock budget `unkettle` spends per call, matching spec.md's "~16 ms budget".
const UNKETTLE_BUDGET: Duration = Duration::from_millis(16);

/// An owned, borrow-free mirror of [`StepKind`]. See the module doc comment for why this
/// exists instead of matching `&StepKind` directly.
enum Op {
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

fn resolve(kind: &StepKind) -> Op {
    match kind {
        StepKind::TensorLiteral(t) => Op::TensorLiteral(t.view()),
        StepKind::Compute { index } => Op::Compute { index: *index },
        StepKind::Binary(op) => Op::Binary(*op),
        StepKind::Unary(op) => Op::Unary(*op),
        StepKind::Minmax => Op::Minmax,
        StepKind::Length => Op::Length,
        StepKind::Reverse => Op::Reverse,
        StepKind::Transpose => Op::Transpose,
        StepKind::Slice => Op::Slice,
        StepKind::Shape => Op::Shape,
        StepKind::Size => Op::Size,
        StepKind::Dup => Op::Dup,
        StepKind::Rep => Op::Rep,
        StepKind::Pop => Op::Pop,
        StepKind::Bury => Op::Bury,
        StepKind::Raise => Op::Raise,
        StepKind::First => Op::First,
        StepKind::Last => Op::Last,
        StepKind::Enclose => Op::Enclose,
        StepKind::Extrude => Op::Extrude,
        StepKind::Unextrude => Op::Unextrude,
        StepKind::Cat => Op::Cat,
        StepKind::MatMul => Op::MatMul,
        StepKind::Translate => Op::Translate,
        StepKind::Rot => Op::Rot,
        StepKind::Proj => Op::Proj,
        StepKind::Ortho => Op::Ortho,
        StepKind::Reshape => Op::Reshape,
        StepKind::Index => Op::Index,
        StepKind::Sort => Op::Sort,
        StepKind::SetVar { name, slot } => Op::SetVar { name: name.clone(), slot: *slot },
        StepKind::GetVar { name, slot } => Op::GetVar { name: name.clone(), slot: *slot },
        StepKind::If { target } => Op::If { target: *target },
        StepKind::Ifn { target } => Op::Ifn { target: *target },
        StepKind::Call { target } => Op::Call { target: *target },
        StepKind::Return => Op::Return,
        StepKind::Quit => Op::Quit,
        StepKind::Load(src) => Op::Load(src.clone()),
        StepKind::Eval => Op::Eval,
        StepKind::Img(path) => Op::Img(path.clone()),
        StepKind::Gltf(path) => Op::Gltf(path.clone()),
        StepKind::TextBufferView => Op::TextBufferView,
        StepKind::Kettle => Op::Kettle,
        StepKind::Unkettle => Op::Unkettle,
        StepKind::Texture => Op::Texture,
        StepKind::Print => Op::Print,
        StepKind::PrintLine => Op::PrintLine,
        StepKind::PrintString => Op::PrintString,
        StepKind::ToString => Op::ToString,
        StepKind::Keys => Op::Keys,
        StepKind::Input => Op::Input,
        StepKind::Gamepad => Op::Gamepad,
        StepKind::GamepadRumble => Op::GamepadRumble,
        StepKind::TextInput => Op::TextInput,
        StepKind::WindowSize => Op::WindowSize,
        StepKind::TimeDelta => Op::TimeDelta,
        StepKind::Backface => Op::Backface,
        StepKind::Depth => Op::Depth,
        StepKind::Additive => Op::Additive,
        StepKind::Fullscreen => Op::Fullscreen,
        StepKind::TransferStart => Op::TransferStart,
        StepKind::TransferEnd => Op::TransferEnd,
        StepKind::Cls => Op::Cls,
        StepKind::Continue => Op::Continue,
    }
}

/// What the dispatch loop should do after one step.
enum Control {
    Next,
    Jump(usize),
    Quit,
    /// `load` swapped in a new program and cleared the stack; the current pass ends here,
    /// successfully, matching the original's `return true` inside the `LOAD` case.
    Reloaded,
}

pub struct Evaluator {
    device: Device,
    loader: FsLoader,
    program: Program,
    stack: TensorStack,
    computes: Vec<Option<Compute>>,
    returns: Vec<usize>,
    pc: usize,
    variables_buffer: wgpu::Buffer,
    variables_host: Vec<f32>,
    bigvars: HashMap<u32, Tensor>,
    render_state: RenderState,
    /// `backface` has no effect on the pipelines `atlas-compute` builds (culling is baked
    /// into each pipeline's fixed `PrimitiveState`, see `RenderState`'s doc comment), so this
    /// is tracked only so the step's toggle semantics are observable; it does not currently
    /// change how anything draws.
    backface: bool,
    pub host_input: HostInput,
    pub host_commands: Vec<HostCommand>,
    unkettle: HashMap<String, Unkettle>,
    display_texture: Option<Tensor>,
}

impl Evaluator {
    pub fn new(device: Device, main_filename: &str, source: &str) -> Result<Self> {
        let loader = FsLoader;
        let program = compile(&loader, main_filename, source).map_err(|e| RuntimeError::new(main_filename, 0, 0, Detail::Reload(main_filename.to_string(), e.to_string())))?;
        let variables_buffer = Self::make_variables_buffer(&device, program.var_floats);
        let computes = (0..program.computes.len()).map(|_| None).collect();
        Ok(Self {
            device,
            loader,
            variables_host: vec![0.0; program.var_floats.max(1) as usize],
            program,
            stack: TensorStack::new(),
            computes,
            returns: Vec::new(),
            pc: 0,
            variables_buffer,
            bigvars: HashMap::new(),
            render_state: RenderState::default(),
            backface: false,
            host_input: HostInput::default(),
            host_commands: Vec::new(),
            unkettle: HashMap::new(),
            display_texture: None,
        })
    }

    fn make_variables_buffer(device: &Device, var_floats: u32) -> wgpu::Buffer {
        let size = (var_floats.max(1) as u64 * 4).max(16);
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("atlas-variables"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// The tensor a `texture` step most recently bound, if any; the host's presentation layer
    /// reads this to know what to show.
    pub fn display_texture(&self) -> Option<&Tensor> {
        self.display_texture.as_ref()
    }

    /// Runs one full pass over the current program's steps, mirroring `runProgram`. Returns
    /// `Ok(true)` if the host should call this again next frame, `Ok(false)` if a `quit` step
    /// ran and the host should stop.
    pub fn run_pass(&mut self) -> Result<bool> {
        self.pc = 0;
        while self.pc < self.program.steps.len() {
            let filename = self.program.steps[self.pc].filename.clone();
            let linenum = self.program.steps[self.pc].linenum;
            let commandnum = self.program.steps[self.pc].commandnum;
            match self.execute_step() {
                Ok(Control::Next) => self.pc += 1,
                Ok(Control::Jump(target)) => self.pc = target,
                Ok(Control::Quit) => return Ok(false),
                Ok(Control::Reloaded) => return Ok(true),
                Err(detail) => return Err(RuntimeError::new(&filename, linenum, commandnum, detail)),
            }
        }
        Ok(true)
    }

    fn execute_step(&mut self) -> std::result::Result<Control, Detail> {
        let op = resolve(&self.program.steps[self.pc].kind);
        match op {
            Op::TensorLiteral(t) => {
                self.stack.push(t);
                Ok(Control::Next)
            }
            Op::Compute { index } => {
                self.run_compute(index)?;
                Ok(Control::Next)
            }
            Op::Binary(op) => {
                self.binary(op)?;
                Ok(Control::Next)
            }
            Op::Unary(op) => {
                self.stack.top()?.unary_in_place(op)?;
                Ok(Control::Next)
            }
            Op::Minmax => {
                self.minmax()?;
                Ok(Control::Next)
            }
            Op::Length => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.length()?);
                Ok(Control::Next)
            }
            Op::Reverse => {
                let axis = self.pop_scalar()? as usize;
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.reverse(axis)?);
                Ok(Control::Next)
            }
            Op::Transpose => {
                let axes = self.pop_vector()?;
                if axes.len() != 2 {
                    return Err(Detail::NotVector);
                }
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.transpose(axes[0] as usize, axes[1] as usize)?);
                Ok(Control::Next)
            }
            Op::Slice => {
                let params = self.pop_vector()?;
                if params.len() != 3 {
                    return Err(Detail::NotVector);
                }
                let (start, end, axis) = (params[0] as i64, params[1] as i64, params[2] as usize);
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.slice(axis, start, end)?);
                Ok(Control::Next)
            }
            Op::Shape => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.shape_vector());
                Ok(Control::Next)
            }
            Op::Size => {
                self.stack.push(Tensor::scalar(self.stack.len() as f32));
                Ok(Control::Next)
            }
            Op::Dup => {
                self.dup()?;
                Ok(Control::Next)
            }
            Op::Rep => {
                let count = self.pop_scalar()? as u32;
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.repeat(count)?);
                Ok(Control::Next)
            }
            Op::Pop => {
                self.stack.pop()?;
                Ok(Control::Next)
            }
            Op::Bury => {
                self.bury()?;
                Ok(Control::Next)
            }
            Op::Raise => {
                self.raise()?;
                Ok(Control::Next)
            }
            Op::First => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.take_first()?);
                Ok(Control::Next)
            }
            Op::Last => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.take_last()?);
                Ok(Control::Next)
            }
            Op::Enclose => {
                let t = self.stack.pop()?;
                self.stack.push(t.enclose()?);
                Ok(Control::Next)
            }
            Op::Extrude => {
                let t = self.stack.pop()?;
                self.stack.push(t.extrude()?);
                Ok(Control::Next)
            }
            Op::Unextrude => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.unextrude()?);
                Ok(Control::Next)
            }
            Op::Cat => {
                self.cat()?;
                Ok(Control::Next)
            }
            Op::MatMul => {
                let top = self.stack.pop()?.to_host_memory(&self.device)?;
                let second = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(top.matmul(&second)?);
                Ok(Control::Next)
            }
            Op::Translate => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.translate()?);
                Ok(Control::Next)
            }
            Op::Rot => {
                let angle = self.stack.pop()?.to_host_memory(&self.device)?;
                let axis = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(axis.rotate(&angle)?);
                Ok(Control::Next)
            }
            Op::Proj => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.project()?);
                Ok(Control::Next)
            }
            Op::Ortho => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.ortho()?);
                Ok(Control::Next)
            }
            Op::Reshape => {
                let shape = self.pop_vector()?;
                let shape: Vec<u32> = shape.iter().map(|&v| v as u32).collect();
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.reshape(&shape)?);
                Ok(Control::Next)
            }
            Op::Index => {
                let axis = self.pop_scalar()? as usize;
                let indices = self.stack.pop()?.to_host_memory(&self.device)?;
                let target = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(target.index(&indices, axis)?);
                Ok(Control::Next)
            }
            Op::Sort => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                self.stack.push(t.sort()?);
                Ok(Control::Next)
            }
            Op::SetVar { name: _, slot } => {
                self.set_var(slot)?;
                Ok(Control::Next)
            }
            Op::GetVar { name: _, slot } => {
                self.get_var(slot)?;
                Ok(Control::Next)
            }
            Op::If { target } => {
                let cond = self.pop_scalar()?;
                Ok(if cond > 0.0 { Control::Jump(target) } else { Control::Next })
            }
            Op::Ifn { target } => {
                let cond = self.pop_scalar()?;
                Ok(if cond <= 0.0 { Control::Jump(target) } else { Control::Next })
            }
            Op::Call { target } => {
                self.returns.push(self.pc + 1);
                Ok(Control::Jump(target))
            }
            Op::Return => {
                let target = self.returns.pop().ok_or(Detail::EmptyReturnStack)?;
                Ok(Control::Jump(target))
            }
            Op::Quit => Ok(Control::Quit),
            Op::Load(src) => self.load(src),
            Op::Eval => self.eval(),
            Op::Img(path) => {
                let t = io::image::load(&path)?;
                self.stack.push(t);
                Ok(Control::Next)
            }
            Op::Gltf(path) => {
                let import = io::gltf::load(&path)?;
                self.stack.push(import.verts);
                self.stack.push(import.indices);
                self.stack.push(import.bones);
                self.stack.push(import.materials);
                Ok(Control::Next)
            }
            Op::TextBufferView => {
                self.text_buffer_view()?;
                Ok(Control::Next)
            }
            Op::Kettle => {
                self.do_kettle()?;
                Ok(Control::Next)
            }
            Op::Unkettle => {
                self.do_unkettle()?;
                Ok(Control::Next)
            }
            Op::Texture => {
                self.texture()?;
                Ok(Control::Next)
            }
            Op::Print => {
                for i in 0..self.stack.len() {
                    let t = self.stack.get(i)?.to_host_memory(&self.device)?;
                    println!("{}", format_tensor(&t)?);
                }
                Ok(Control::Next)
            }
            Op::PrintLine => {
                let t = self.stack.top()?.to_host_memory(&self.device)?;
                println!("{}", format_tensor(&t)?);
                Ok(Control::Next)
            }
            Op::PrintString => {
                let s = self.peek_string()?;
                println!("{s}");
                Ok(Control::Next)
            }
            Op::ToString => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                if t.rank() != 0 {
                    return Err(Detail::NotScalar);
                }
                let formatted = format!("{:.2}", t.get(&[])?);
                self.stack.push(tensor_from_str(&formatted));
                Ok(Control::Next)
            }
            Op::Keys => {
                self.stack.push(Tensor::vector(self.host_input.keys.clone()));
                Ok(Control::Next)
            }
            Op::Input => {
                let i = &mut self.host_input;
                let data = vec![i.mouse_dx, i.mouse_dy, i.wheel_delta, i.left_button, i.right_button, i.middle_button];
                i.mouse_dx = 0.0;
                i.mouse_dy = 0.0;
                self.stack.push(Tensor::vector(data));
                Ok(Control::Next)
            }
            Op::Gamepad => {
                let n = self.host_input.gamepads.len() as u32;
                let data: Vec<f32> = self.host_input.gamepads.iter().flatten().copied().collect();
                self.stack.push(Tensor::from_host(&[n, 21], data));
                Ok(Control::Next)
            }
            Op::GamepadRumble => {
                let right = self.pop_scalar()?;
                let left = self.pop_scalar()?;
                let gamepad = self.pop_scalar()? as u32;
                self.host_commands.push(HostCommand::GamepadRumble { gamepad, left, right });
                Ok(Control::Next)
            }
            Op::TextInput => {
                self.stack.push(tensor_from_str(&self.host_input.text_input));
                Ok(Control::Next)
            }
            Op::WindowSize => {
                self.stack.push(Tensor::vector(vec![self.host_input.window_width, self.host_input.window_height]));
                Ok(Control::Next)
            }
            Op::TimeDelta => {
                self.stack.push(Tensor::scalar(self.host_input.time_delta));
                Ok(Control::Next)
            }
            Op::Backface => {
                self.backface = !self.backface;
                Ok(Control::Next)
            }
            Op::Depth => {
                self.render_state.depth = !self.render_state.depth;
                Ok(Control::Next)
            }
            Op::Additive => {
                self.render_state.additive = !self.render_state.additive;
                Ok(Control::Next)
            }
            Op::Fullscreen => {
                self.host_commands.push(HostCommand::Fullscreen);
                Ok(Control::Next)
            }
            Op::TransferStart => {
                let t = self.stack.pop()?;
                self.stack.push(t.transfer_start(&self.device)?);
                Ok(Control::Next)
            }
            Op::TransferEnd => {
                let t = self.stack.pop()?;
                self.stack.push(t.transfer_end(&self.device)?);
                Ok(Control::Next)
            }
            Op::Cls => {
                self.stack = TensorStack::new();
                Ok(Control::Next)
            }
            Op::Continue => Ok(Control::Next),
        }
    }

    fn binary(&mut self, op: BinaryOp) -> std::result::Result<(), Detail> {
        let b = self.stack.pop()?.to_host_memory(&self.device)?;
        let a = self.stack.pop()?.to_host_memory(&self.device)?;
        self.stack.push(a.binary(&b, op)?);
        Ok(())
    }

    fn minmax(&mut self) -> std::result::Result<(), Detail> {
        let t = self.stack.pop()?.to_host_memory(&self.device)?;
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for v in t.to_vec()? {
            min = min.min(v);
            max = max.max(v);
        }
        self.stack.push(Tensor::vector(vec![min, max]));
        Ok(())
    }

    /// `dup`: pop a depth index, then push a copy of the tensor that many positions down
    /// from the new top. Grounded in `case DUP` in `original_source/program.c`.
    fn dup(&mut self) -> std::result::Result<(), Detail> {
        let depth = self.pop_scalar()? as usize;
        if depth + 1 > self.stack.len() {
            return Err(Detail::StackIndexOutOfRange);
        }
        let source = self.stack.get(self.stack.len() - 1 - depth)?;
        let copy = source.take_ownership(&self.device)?;
        self.stack.push(copy);
        Ok(())
    }

    /// `bury`: pop a count `n`, then move the new top beneath the `n` tensors above it,
    /// preserving their relative order. Grounded in `case BURY`.
    fn bury(&mut self) -> std::result::Result<(), Detail> {
        let n = self.pop_scalar()? as usize;
        if n >= self.stack.len() {
            return Err(Detail::StackIndexOutOfRange);
        }
        let buried = self.stack.pop()?;
        let mut shifted = Vec::with_capacity(n);
        for _ in 0..n {
            shifted.push(self.stack.pop()?);
        }
        self.stack.push(buried);
        while let Some(t) = shifted.pop() {
            self.stack.push(t);
        }
        Ok(())
    }

    /// `raise`: pop a count `n`, then move the tensor `n` positions down to the top,
    /// preserving the relative order of what was above it. Grounded in `case RAISE`.
    fn raise(&mut self) -> std::result::Result<(), Detail> {
        let n = self.pop_scalar()? as usize;
        if n >= self.stack.len() {
            return Err(Detail::StackIndexOutOfRange);
        }
        let mut above = Vec::with_capacity(n);
        for _ in 0..n {
            above.push(self.stack.pop()?);
        }
        let target = self.stack.pop()?;
        while let Some(t) = above.pop() {
            self.stack.push(t);
        }
        self.stack.push(target);
        Ok(())
    }

    fn cat(&mut self) -> std::result::Result<(), Detail> {
        let axis = self.pop_scalar()? as usize;
        let b = self.stack.pop()?.to_host_memory(&self.device)?;
        let a = self.stack.pop()?.to_host_memory(&self.device)?;
        self.stack.push(a.cat(&b, axis)?);
        Ok(())
    }

    fn run_compute(&mut self, index: usize) -> std::result::Result<(), Detail> {
        let decl = self.program.computes.get(index).ok_or(Detail::UnknownCompute(index))?;
        if self.computes[index].is_none() {
            self.computes[index] = Some(Compute::new(&self.device, &decl.shader, decl.reuse)?);
        }
        let compute = self.computes[index].as_ref().unwrap();
        execute_compute(compute, &self.device, &mut self.stack, &self.variables_buffer, self.render_state)?;
        Ok(())
    }

    /// `set`: a sized variable overwrites its uniform-block slot (and is pushed to the GPU
    /// immediately so every following compute step in this pass sees the change, since they
    /// all bind the same `variables_buffer`); a zero-sized ("big") variable moves the whole
    /// tensor into `bigvars`, replacing whatever was there. Grounded in `case SET`.
    fn set_var(&mut self, slot: VarSlot) -> std::result::Result<(), Detail> {
        match slot {
            VarSlot::Sized { offset, size } => {
                let t = self.stack.pop()?.to_host_memory(&self.device)?;
                if (size <= 4 && t.rank() != 1) || (size == 16 && t.rank() != 2) {
                    return Err(Detail::NotVector);
                }
                if t.size() != size {
                    return Err(Detail::NotVector);
                }
                let values = t.to_vec()?;
                let start = offset as usize;
                self.variables_host[start..start + values.len()].copy_from_slice(&values);
                self.device.write_buffer(&self.variables_buffer, offset as u64 * 4, bytemuck::cast_slice(&values));
            }
            VarSlot::Big { index } => {
                let t = self.stack.pop()?;
                self.bigvars.insert(index, t.take_ownership(&self.device)?);
            }
        }
        Ok(())
    }

    /// `get`: a sized variable pushes a fresh vector/matrix view built from the uniform
    /// block's host mirror; a big variable pushes a copy of the stored tensor.
    fn get_var(&mut self, slot: VarSlot) -> std::result::Result<(), Detail> {
        match slot {
            VarSlot::Sized { offset, size } => {
                let start = offset as usize;
                let values = self.variables_host[start..start + size as usize].to_vec();
                let t = if size == 16 { Tensor::from_host(&[4, 4], values) } else { Tensor::vector(values) };
                self.stack.push(t);
            }
            VarSlot::Big { index } => {
                let t = self.bigvars.get(&index).ok_or(Detail::UnknownVarSlot)?;
                self.stack.push(t.take_ownership(&self.device)?);
            }
        }
        Ok(())
    }

    /// `load`: compile a new program (either from a literal path or a stack-popped
    /// filename), delete the current one, clear the stack, and end this pass so the host
    /// calls `run_pass` again on the freshly swapped-in program next frame. Grounded in
    /// `case LOAD`.
    fn load(&mut self, src: LoadSource) -> std::result::Result<Control, Detail> {
        let path = match src {
            LoadSource::Path(path) => path,
            LoadSource::Dynamic => self.pop_string()?,
        };
        let source = std::fs::read_to_string(&path).map_err(|e| Detail::Io(path.clone(), e.to_string()))?;
        let program = compile(&self.loader, &path, &source).map_err(|e| Detail::Reload(path.clone(), e.to_string()))?;
        self.variables_buffer = Self::make_variables_buffer(&self.device, program.var_floats);
        self.variables_host = vec![0.0; program.var_floats.max(1) as usize];
        self.computes = (0..program.computes.len()).map(|_| None).collect();
        self.bigvars.clear();
        self.returns.clear();
        self.program = program;
        self.stack = TensorStack::new();
        Ok(Control::Reloaded)
    }

    /// `eval`: compiles `src` (a stack-popped string) as a standalone tail program and
    /// splices its steps in after the current one, matching spec.md's
    /// "`Evaluator::eval` compiles `src` as an appended, unresolved-label-tolerant tail and
    /// splices it after the current step" contract. Labels/branches inside the spliced
    /// fragment resolve only against themselves: the fragment cannot jump back into the
    /// surrounding program, and the surrounding program cannot declare new variables or
    /// computes from within it (it shares the running program's variable block and compute
    /// table as they stood before the splice).
    fn eval(&mut self) -> std::result::Result<Control, Detail> {
        let src = self.pop_string()?;
        let fragment = compile(&self.loader, "<eval>", &src).map_err(|e| Detail::Reload("<eval>".to_string(), e.to_string()))?;
        if fragment.var_floats > 0 || !fragment.bigvar_names.is_empty() {
            return Err(Detail::Reload("<eval>".to_string(), "eval fragments may not declare variables".to_string()));
        }

        let insert_at = self.pc + 1;
        let compute_base = self.program.computes.len();
        let mut steps = fragment.steps;
        for step in &mut steps {
            match &mut step.kind {
                StepKind::If { target } | StepKind::Ifn { target } | StepKind::Call { target } => *target += insert_at,
                StepKind::Compute { index } => *index += compute_base,
                _ => {}
            }
        }
        for decl in fragment.computes {
            self.program.computes.push(decl);
            self.computes.push(None);
        }

        let tail = self.program.steps.split_off(insert_at);
        self.program.steps.extend(steps);
        self.program.steps.extend(tail);
        Ok(Control::Next)
    }

    fn text_buffer_view(&mut self) -> std::result::Result<(), Detail> {
        let dims = self.pop_vector()?;
        if dims.len() != 2 {
            return Err(Detail::NotVector);
        }
        let _text = self.pop_string()?;
        let (w, h) = (dims[0] as u32, dims[1] as u32);
        self.stack.push(Tensor::from_host(&[w, h, 1], vec![0.0; (w * h) as usize]));
        Ok(())
    }

    /// `kettle`: pops the destination filename, then the count, and serializes the `count`
    /// tensors below them (which are read, not popped, by `atlas_kettle::kettle`). The
    /// filename-then-count pop order follows spec.md §8's round-trip scenario
    /// (`kettle 3 'out.ktl'`, where the literal pushes land count below filename); `kettle`
    /// has no inline-step form in the original, which only ever invokes it from a console
    /// command, so this ordering is a documented convention rather than a ported one.
    fn do_kettle(&mut self) -> std::result::Result<(), Detail> {
        let path = self.pop_string()?;
        let count = self.pop_scalar()? as u32;
        kettle(&self.device, &mut self.stack, count, &path)?;
        Ok(())
    }

    /// `unkettle`: pops the source filename, advances that file's (persistent,
    /// per-filename) time-sliced read state by one budgeted step, and pushes the resulting
    /// progress value (shrinking toward 0 as `Unkettle::step` documents) so a script can
    /// poll for completion; the decoded tensors themselves are pushed directly onto the
    /// stack by `Unkettle::step` once its `UPLOAD` stage finishes.
    fn do_unkettle(&mut self) -> std::result::Result<(), Detail> {
        let path = self.pop_string()?;
        let unkettle = self.unkettle.entry(path.clone()).or_insert_with(|| Unkettle::new(path.clone()));
        let progress = unkettle.step(&self.device, &mut self.stack, UNKETTLE_BUDGET)?;
        if progress.done {
            self.unkettle.remove(&path);
        }
        self.stack.push(Tensor::scalar(progress.value));
        Ok(())
    }

    /// `texture`: binds the top-of-stack channeled GPU tensor as the display texture,
    /// non-destructively (no pop, no push). Grounded in `case TEXTURE`; mipmap generation and
    /// sampler state are the host presentation layer's concern once it reads
    /// [`Evaluator::display_texture`].
    fn texture(&mut self) -> std::result::Result<(), Detail> {
        let t = self.stack.top()?;
        if !t.is_gpu() {
            return Err(Detail::NotAChanneledTexture);
        }
        self.display_texture = Some(t.view());
        Ok(())
    }

    fn pop_scalar(&mut self) -> std::result::Result<f32, Detail> {
        let t = self.stack.pop()?.to_host_memory(&self.device)?;
        if t.rank() != 0 {
            return Err(Detail::NotScalar);
        }
        t.get(&[]).map_err(Detail::from)
    }

    fn pop_vector(&mut self) -> std::result::Result<Vec<f32>, Detail> {
        let t = self.stack.pop()?.to_host_memory(&self.device)?;
        if t.rank() != 1 {
            return Err(Detail::NotVector);
        }
        t.to_vec().map_err(Detail::from)
    }

    fn pop_string(&mut self) -> std::result::Result<String, Detail> {
        let bytes = self.pop_vector()?;
        Ok(bytes.into_iter().map(|b| b as u8 as char).collect())
    }

    fn peek_string(&mut self) -> std::result::Result<String, Detail> {
        let t = self.stack.top()?.to_host_memory(&self.device)?;
        if t.rank() != 1 {
            return Err(Detail::NotVector);
        }
        Ok(t.to_vec()?.into_iter().map(|b| b as u8 as char).collect())
    }
}

/// String literals (and, by extension, every stack-carried filename) are rank-1 vectors of
/// byte values. Grounded in `tensorFromString`/`literal::tensor_from_string`.
fn tensor_from_str(s: &str) -> Tensor {
    Tensor::vector(s.bytes().map(|b| b as f32).collect())
}
