//! Function body translation.
//!
//! Single forward pass over the instruction sequence with:
//! - An operand stack of pending expressions, flushed into `let` temporaries
//!   before anything that could observe or change their inputs
//! - A control-frame stack mapping `block`/`loop`/`if` onto labeled Rust
//!   blocks and loops, so branches become `break`/`continue`/`return`
//! - Dead-code skipping after unconditional transfers, still validating
//!   every reference

use std::fmt::Write;

use tracing::trace;
use wirgen_ir::{BlockType, Function, Instr, Module, Signature, ValType};

use crate::config::EmitConfig;
use crate::error::{FunctionError, FunctionErrorKind};
use crate::expr::{self, Kind, Operand, Rendered};
use crate::header::{GENERATED_ALLOWS, context_impl, context_uses, file_header};

type Result<T> = std::result::Result<T, FunctionErrorKind>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    Function,
    Block,
    Loop,
    If { in_then: bool },
}

#[derive(Clone, Debug)]
struct Frame {
    kind: FrameKind,
    label: String,
    result: Option<ValType>,
    /// Temporary bound to the frame's value.
    result_var: Option<String>,
    /// Operand stack height at entry.
    height: usize,
    unreachable: bool,
    /// Indentation of the frame's body.
    indent: usize,
}

impl Frame {
    /// Arity of a branch to this frame.
    const fn branch_arity(&self) -> Option<ValType> {
        match self.kind {
            FrameKind::Loop => None,
            _ => self.result,
        }
    }
}

/// Translates one function into its own artifact.
pub struct FunctionEmitter<'a> {
    module: &'a Module,
    cfg: &'a EmitConfig,
    func: &'a Function,
    out: String,
    stack: Vec<Operand>,
    frames: Vec<Frame>,
    /// Structured instructions opened inside dead code.
    dead_depth: usize,
    next_temp: usize,
    next_label: usize,
}

impl<'a> FunctionEmitter<'a> {
    #[must_use]
    pub fn new(module: &'a Module, cfg: &'a EmitConfig, func: &'a Function) -> Self {
        Self {
            module,
            cfg,
            func,
            out: String::with_capacity(4096),
            stack: Vec::new(),
            frames: Vec::new(),
            dead_depth: 0,
            next_temp: 0,
            next_label: 0,
        }
    }

    /// Generate the artifact.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending instruction if the body is
    /// malformed or ill-typed.
    pub fn emit(mut self) -> std::result::Result<String, FunctionError> {
        let id = self.func.id;
        let fail = |offset: usize, kind| FunctionError {
            func: id,
            offset,
            kind,
        };
        if self.func.signature.results.len() > 1 {
            return Err(fail(0, FunctionErrorKind::MultiValue));
        }

        self.prologue();
        for (offset, instr) in self.func.body.iter().enumerate() {
            if self.frames.is_empty() {
                return Err(fail(offset, FunctionErrorKind::TrailingInstructions));
            }
            self.instr(offset, instr).map_err(|kind| fail(offset, kind))?;
        }
        if !self.frames.is_empty() {
            return Err(fail(self.func.body.len(), FunctionErrorKind::MissingEnd));
        }
        self.out.push_str("    }\n}\n");
        trace!(func = id, temps = self.next_temp, labels = self.next_label, "function emitted");
        Ok(self.out)
    }

    fn prologue(&mut self) {
        let func = self.func;
        self.out = file_header(self.cfg, &format!("Function {}.", func.id));
        self.out.push('\n');
        self.out.push_str(GENERATED_ALLOWS);
        self.out.push('\n');
        self.out.push_str(&context_uses(self.module));
        self.out.push('\n');
        let _ = writeln!(self.out, "{}", context_impl(self.module));

        let mut params = String::from("&mut self");
        for (i, ty) in func.signature.params.iter().enumerate() {
            let _ = write!(params, ", mut l{i}: {ty}");
        }
        let _ = writeln!(
            self.out,
            "    pub(crate) fn f{}({params}) -> {} {{",
            func.id,
            result_type(&func.signature)
        );

        let first = func.signature.params.len();
        for (i, ty) in func.locals.iter().enumerate() {
            let _ = writeln!(
                self.out,
                "        let mut l{}: {ty} = {};",
                first + i,
                expr::render_value(ty.zero())
            );
        }

        self.frames.push(Frame {
            kind: FrameKind::Function,
            label: String::new(),
            result: func.signature.result(),
            result_var: None,
            height: 0,
            unreachable: false,
            indent: 2,
        });
    }

    // ============= Output helpers =============

    fn line(&mut self, indent: usize, s: &str) {
        for _ in 0..indent {
            self.out.push_str("    ");
        }
        self.out.push_str(s);
        self.out.push('\n');
    }

    fn stmt(&mut self, s: &str) {
        let indent = self.indent();
        self.line(indent, s);
    }

    fn indent(&self) -> usize {
        self.frames.last().map_or(2, |f| f.indent)
    }

    fn frame(&self) -> &Frame {
        // Callers only run while at least the function frame is open.
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn temp(&mut self) -> String {
        let name = format!("t{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    fn label(&mut self, prefix: char) -> String {
        let name = format!("'{prefix}{}", self.next_label);
        self.next_label += 1;
        name
    }

    // ============= Operand stack =============

    fn push(&mut self, operand: Operand) {
        self.stack.push(operand);
    }

    fn pop(&mut self) -> Result<Operand> {
        if self.stack.len() <= self.frame().height {
            return Err(FunctionErrorKind::StackUnderflow);
        }
        self.stack.pop().ok_or(FunctionErrorKind::StackUnderflow)
    }

    fn pop_typed(&mut self, expected: ValType) -> Result<Operand> {
        let operand = self.pop()?;
        check_type(expected, operand.ty)?;
        Ok(operand)
    }

    fn peek_typed(&self, expected: ValType) -> Result<&Operand> {
        if self.stack.len() <= self.frame().height {
            return Err(FunctionErrorKind::StackUnderflow);
        }
        let operand = &self.stack[self.stack.len() - 1];
        check_type(expected, operand.ty)?;
        Ok(operand)
    }

    /// Bind the operand at `index` to a temporary.
    fn materialize(&mut self, index: usize) {
        let name = self.temp();
        let operand = &self.stack[index];
        let line = format!("let {name}: {} = {};", operand.ty, operand.expr);
        let ty = operand.ty;
        self.stmt(&line);
        self.stack[index] = Operand::temp(name, ty);
    }

    /// Materialize every unstable operand matching `pred`, plus any trapping
    /// operand below the highest match so traps keep their order.
    fn flush_where(&mut self, pred: impl Fn(&Operand) -> bool) {
        let Some(last) = self
            .stack
            .iter()
            .rposition(|o| !o.is_stable() && pred(o))
        else {
            return;
        };
        for i in 0..=last {
            let operand = &self.stack[i];
            if !operand.is_stable() && (pred(operand) || operand.may_trap) {
                self.materialize(i);
            }
        }
    }

    /// Materialize every pending operand. Needed before entering a nested
    /// scope, where later flushes would bind temporaries out of reach.
    fn flush_all(&mut self) {
        self.flush_where(|_| true);
    }

    /// Materialize every operand a side effect could change. Plain local
    /// reads survive anything but a write to that local.
    fn flush_effects(&mut self) {
        self.flush_where(|o| o.kind != Kind::Local);
    }

    // ============= Reference validation =============

    fn local_type(&self, index: u32) -> Result<ValType> {
        self.func
            .local_type(index)
            .ok_or(FunctionErrorKind::UnknownLocal(index))
    }

    fn callee(&self, id: u32) -> Result<&'a Signature> {
        let func = self
            .module
            .function(id)
            .ok_or(FunctionErrorKind::UnknownFunction(id))?;
        Ok(&func.signature)
    }

    fn import_signature(&self, index: u32) -> Result<&'a Signature> {
        let import = self
            .module
            .import(index)
            .ok_or(FunctionErrorKind::UnknownImport(index))?;
        Ok(&import.signature)
    }

    fn require_memory(&self) -> Result<()> {
        if self.module.has_memory() {
            Ok(())
        } else {
            Err(FunctionErrorKind::MissingMemory)
        }
    }

    /// Validate every index the instruction names.
    fn check_refs(&self, instr: &Instr) -> Result<()> {
        match instr {
            Instr::Call(id) => {
                self.callee(*id)?;
            }
            Instr::CallImport(index) => {
                self.import_signature(*index)?;
            }
            Instr::CallIndirect(ty) => {
                self.module
                    .signature(*ty)
                    .ok_or(FunctionErrorKind::UnknownType(*ty))?;
                if self.module.table.is_none() {
                    return Err(FunctionErrorKind::MissingTable);
                }
            }
            Instr::LocalGet(i) | Instr::LocalSet(i) | Instr::LocalTee(i) => {
                self.local_type(*i)?;
            }
            Instr::GlobalGet(i) => {
                self.module
                    .global(*i)
                    .ok_or(FunctionErrorKind::UnknownGlobal(*i))?;
            }
            Instr::GlobalSet(i) => {
                let global = self
                    .module
                    .global(*i)
                    .ok_or(FunctionErrorKind::UnknownGlobal(*i))?;
                if !global.mutable {
                    return Err(FunctionErrorKind::ImmutableGlobal(*i));
                }
            }
            Instr::Load(..) | Instr::Store(..) | Instr::MemorySize | Instr::MemoryGrow => {
                self.require_memory()?;
            }
            Instr::Unary(ty, op) if !op.valid_for(*ty) => {
                return Err(FunctionErrorKind::InvalidOperator { op: op.name(), ty: *ty });
            }
            Instr::Binary(ty, op) if !op.valid_for(*ty) => {
                return Err(FunctionErrorKind::InvalidOperator { op: op.name(), ty: *ty });
            }
            Instr::Br(depth) | Instr::BrIf(depth) => self.check_depth(*depth)?,
            Instr::BrTable { targets, default } => {
                for depth in targets.iter().chain(std::iter::once(default)) {
                    self.check_depth(*depth)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_depth(&self, depth: u32) -> Result<()> {
        if (depth as usize) < self.frames.len() + self.dead_depth {
            Ok(())
        } else {
            Err(FunctionErrorKind::BranchDepth(depth))
        }
    }

    // ============= Instructions =============

    fn instr(&mut self, offset: usize, instr: &Instr) -> Result<()> {
        self.check_refs(instr)?;

        if self.frame().unreachable {
            match instr {
                Instr::Block(_) | Instr::Loop(_) | Instr::If(_) => {
                    self.dead_depth += 1;
                    return Ok(());
                }
                Instr::End if self.dead_depth > 0 => {
                    self.dead_depth -= 1;
                    return Ok(());
                }
                Instr::Else | Instr::End if self.dead_depth == 0 => {}
                _ => return Ok(()),
            }
        }

        if self.cfg.expr_comments {
            let comment = format!("// @{offset} {instr}");
            self.stmt(&comment);
        }

        match instr {
            Instr::Unreachable => {
                self.flush_where(|o| o.may_trap);
                self.stmt("return Err(Trap::Unreachable);");
                self.set_unreachable();
            }
            Instr::Nop => {}
            Instr::Block(ty) => self.open(FrameKind::Block, *ty)?,
            Instr::Loop(ty) => self.open(FrameKind::Loop, *ty)?,
            Instr::If(ty) => self.open(FrameKind::If { in_then: true }, *ty)?,
            Instr::Else => self.else_()?,
            Instr::End => self.end()?,
            Instr::Br(depth) => {
                self.flush_effects();
                let code = self.branch(*depth)?;
                self.stmt(&format!("{code};"));
                self.set_unreachable();
            }
            Instr::BrIf(depth) => {
                let cond = self.pop_typed(ValType::I32)?;
                self.flush_effects();
                let code = self.branch(*depth)?;
                let indent = self.indent();
                self.line(indent, &format!("if {} {{", cond.truth()));
                self.line(indent + 1, &format!("{code};"));
                self.line(indent, "}");
            }
            Instr::BrTable { targets, default } => self.br_table(targets, *default)?,
            Instr::Return => {
                self.flush_effects();
                let depth = u32::try_from(self.frames.len() - 1).unwrap_or(u32::MAX);
                let code = self.branch(depth)?;
                self.stmt(&format!("{code};"));
                self.set_unreachable();
            }
            Instr::Call(id) => {
                let sig = self.callee(*id)?;
                self.call(sig, &format!("self.f{id}"))?;
            }
            Instr::CallImport(index) => {
                let sig = self.import_signature(*index)?;
                self.call(sig, &format!("self.i{index}"))?;
            }
            Instr::CallIndirect(ty) => self.call_indirect(*ty)?,
            Instr::Drop => {
                let operand = self.pop()?;
                if operand.kind == Kind::Expr && operand.may_trap {
                    self.flush_where(|o| o.may_trap);
                    self.stmt(&format!("let _ = {};", operand.expr));
                }
            }
            Instr::Select => self.select()?,
            Instr::LocalGet(i) => {
                let ty = self.local_type(*i)?;
                self.push(Operand::local(*i, ty));
            }
            Instr::LocalSet(i) | Instr::LocalTee(i) => {
                let ty = self.local_type(*i)?;
                let value = self.pop_typed(ty)?;
                let index = *i;
                let trapping = value.may_trap;
                self.flush_where(|o| o.reads(index) || (trapping && o.may_trap));
                self.stmt(&format!("l{index} = {};", value.expr));
                if matches!(instr, Instr::LocalTee(_)) {
                    self.push(Operand::local(index, ty));
                }
            }
            Instr::GlobalGet(i) => {
                let ty = self.global_type(*i)?;
                self.push(Operand::global(*i, ty));
            }
            Instr::GlobalSet(i) => {
                let ty = self.global_type(*i)?;
                let value = self.pop_typed(ty)?;
                self.flush_effects();
                self.stmt(&format!("self.g{i} = {};", value.expr));
            }
            Instr::Load(op, arg) => {
                let addr = self.pop_typed(ValType::I32)?;
                let rendered = expr::load(*op, &addr.expr, arg.offset, self.cfg.unsafe_access);
                self.push(Operand::derived(rendered, op.result(), &[&addr]));
            }
            Instr::Store(op, arg) => {
                self.flush_effects();
                let value = self.pop_typed(op.operand())?;
                let addr = self.pop_typed(ValType::I32)?;
                let line = expr::store(
                    *op,
                    &addr.expr,
                    &value.expr,
                    arg.offset,
                    self.cfg.unsafe_access,
                );
                self.stmt(&line);
            }
            Instr::MemorySize => {
                let rendered = Rendered {
                    expr: "(self.mem.size() as i32)".to_string(),
                    truth: None,
                    may_trap: false,
                };
                self.push(Operand::derived(rendered, ValType::I32, &[]));
            }
            Instr::MemoryGrow => {
                self.flush_effects();
                let delta = self.pop_typed(ValType::I32)?;
                let name = self.temp();
                self.stmt(&format!("let {name}: i32 = self.mem.grow(({} as u32));", delta.expr));
                self.push(Operand::temp(name, ValType::I32));
            }
            Instr::Const(value) => self.push(Operand::constant(*value)),
            Instr::Unary(ty, op) => {
                let a = self.pop_typed(*ty)?;
                let rendered = expr::unary(*ty, *op, &a.expr);
                self.push(Operand::derived(rendered, op.result(*ty), &[&a]));
            }
            Instr::Binary(ty, op) => {
                let b = self.pop_typed(*ty)?;
                let a = self.pop_typed(*ty)?;
                let rendered = expr::binary(*ty, *op, &a.expr, &b.expr);
                self.push(Operand::derived(rendered, op.result(*ty), &[&a, &b]));
            }
            Instr::Convert(op) => {
                let (from, to) = op.types();
                let a = self.pop_typed(from)?;
                let rendered = expr::convert(*op, &a.expr);
                self.push(Operand::derived(rendered, to, &[&a]));
            }
        }
        Ok(())
    }

    fn global_type(&self, index: u32) -> Result<ValType> {
        self.module
            .global(index)
            .map(|g| g.ty)
            .ok_or(FunctionErrorKind::UnknownGlobal(index))
    }

    fn set_unreachable(&mut self) {
        let height = self.frame().height;
        self.stack.truncate(height);
        self.frame_mut().unreachable = true;
    }

    // ============= Control flow =============

    fn open(&mut self, kind: FrameKind, ty: BlockType) -> Result<()> {
        let cond = match kind {
            FrameKind::If { .. } => Some(self.pop_typed(ValType::I32)?),
            _ => None,
        };
        self.flush_all();

        let label = self.label(if kind == FrameKind::Loop { 'l' } else { 'b' });
        let result = ty.result();
        let result_var = result.map(|_| self.temp());
        let body = if kind == FrameKind::Loop { "loop {" } else { "{" };
        let opener = match (&result_var, result) {
            (Some(var), Some(ty)) => format!("let {var}: {ty} = {label}: {body}"),
            _ => format!("{label}: {body}"),
        };
        let indent = self.indent();
        self.line(indent, &opener);

        let body_indent = if let Some(cond) = cond {
            self.line(indent + 1, &format!("if {} {{", cond.truth()));
            indent + 2
        } else {
            indent + 1
        };

        self.frames.push(Frame {
            kind,
            label,
            result,
            result_var,
            height: self.stack.len(),
            unreachable: false,
            indent: body_indent,
        });
        Ok(())
    }

    /// Check the stack at a frame's fallthrough point and pop its value.
    fn take_result(&mut self) -> Result<Option<Operand>> {
        let frame = self.frame();
        let (height, result) = (frame.height, frame.result);
        let value = match result {
            Some(ty) => Some(self.pop_typed(ty)?),
            None => None,
        };
        if self.stack.len() != height {
            return Err(FunctionErrorKind::UnbalancedStack {
                expected: height + usize::from(result.is_some()),
                found: self.stack.len() + usize::from(result.is_some()),
            });
        }
        Ok(value)
    }

    fn else_(&mut self) -> Result<()> {
        if self.frame().kind != (FrameKind::If { in_then: true }) {
            return Err(FunctionErrorKind::ElseWithoutIf);
        }
        if !self.frame().unreachable {
            let value = self.take_result()?;
            let label = self.frame().label.clone();
            let code = match value {
                Some(v) => format!("break {label} {};", v.expr),
                None => format!("break {label};"),
            };
            self.stmt(&code);
        }
        let frame = self.frame_mut();
        frame.kind = FrameKind::If { in_then: false };
        frame.unreachable = false;
        frame.indent -= 1;
        let (height, indent) = (frame.height, frame.indent);
        self.stack.truncate(height);
        self.line(indent, "}");
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let frame = self.frame().clone();
        if frame.kind == (FrameKind::If { in_then: true }) && frame.result.is_some() {
            return Err(FunctionErrorKind::IfWithoutElse);
        }

        if !frame.unreachable {
            let value = self.take_result()?;
            let code = match (frame.kind, value) {
                (FrameKind::Function, Some(v)) => Some(format!("Ok({})", v.expr)),
                (FrameKind::Function, None) => Some("Ok(())".to_string()),
                (FrameKind::Loop, Some(v)) => Some(format!("break {} {};", frame.label, v.expr)),
                (FrameKind::Loop, None) => Some(format!("break {};", frame.label)),
                (_, Some(v)) => Some(v.expr),
                (_, None) => None,
            };
            if let Some(code) = code {
                self.stmt(&code);
            }
        }

        self.frames.pop();
        self.stack.truncate(frame.height);
        if frame.kind == FrameKind::Function {
            return Ok(());
        }

        let mut indent = frame.indent - 1;
        if frame.kind == (FrameKind::If { in_then: true }) {
            self.line(indent, "}");
            indent -= 1;
        }
        if let (Some(var), Some(ty)) = (frame.result_var, frame.result) {
            self.line(indent, "};");
            self.push(Operand::temp(var, ty));
        } else {
            self.line(indent, "}");
        }
        Ok(())
    }

    /// Transfer code for a branch to the frame `depth` levels up, carrying
    /// the top of the stack when the target takes a value.
    fn branch(&self, depth: u32) -> Result<String> {
        let index = self
            .frames
            .len()
            .checked_sub(1 + depth as usize)
            .ok_or(FunctionErrorKind::BranchDepth(depth))?;
        let target = &self.frames[index];
        let value = match target.branch_arity() {
            Some(ty) => Some(self.peek_typed(ty)?.expr.clone()),
            None => None,
        };
        Ok(match (target.kind, value) {
            (FrameKind::Function, Some(v)) => format!("return Ok({v})"),
            (FrameKind::Function, None) => "return Ok(())".to_string(),
            (FrameKind::Loop, _) => format!("continue {}", target.label),
            (_, Some(v)) => format!("break {} {v}", target.label),
            (_, None) => format!("break {}", target.label),
        })
    }

    fn br_table(&mut self, targets: &[u32], default: u32) -> Result<()> {
        let index = self.pop_typed(ValType::I32)?;
        self.flush_effects();

        let arity = |depth: u32| -> Result<Option<ValType>> {
            let i = self
                .frames
                .len()
                .checked_sub(1 + depth as usize)
                .ok_or(FunctionErrorKind::BranchDepth(depth))?;
            Ok(self.frames[i].branch_arity())
        };
        let expected = arity(default)?;
        for depth in targets {
            if arity(*depth)? != expected {
                return Err(FunctionErrorKind::BranchArity);
            }
        }

        let mut arms = Vec::with_capacity(targets.len() + 1);
        for (i, depth) in targets.iter().enumerate() {
            arms.push(format!("{i} => {},", self.branch(*depth)?));
        }
        arms.push(format!("_ => {},", self.branch(default)?));

        let indent = self.indent();
        self.line(indent, &format!("match ({} as u32) {{", index.expr));
        for arm in &arms {
            self.line(indent + 1, arm);
        }
        self.line(indent, "}");
        self.set_unreachable();
        Ok(())
    }

    /// Pop call arguments for `sig`, in parameter order.
    fn call_args(&mut self, sig: &Signature) -> Result<Vec<String>> {
        let mut args = Vec::with_capacity(sig.params.len());
        for ty in sig.params.iter().rev() {
            args.push(self.pop_typed(*ty)?.expr);
        }
        args.reverse();
        Ok(args)
    }

    fn call(&mut self, sig: &Signature, callee: &str) -> Result<()> {
        if sig.results.len() > 1 {
            return Err(FunctionErrorKind::MultiValue);
        }
        self.flush_effects();
        let args = self.call_args(sig)?.join(", ");
        match sig.result() {
            Some(ty) => {
                let name = self.temp();
                self.stmt(&format!("let {name}: {ty} = {callee}({args})?;"));
                self.push(Operand::temp(name, ty));
            }
            None => self.stmt(&format!("{callee}({args})?;")),
        }
        Ok(())
    }

    fn call_indirect(&mut self, type_index: u32) -> Result<()> {
        let module = self.module;
        let sig = module
            .signature(type_index)
            .ok_or(FunctionErrorKind::UnknownType(type_index))?;
        let table = module.table.as_ref().ok_or(FunctionErrorKind::MissingTable)?;
        if sig.results.len() > 1 {
            return Err(FunctionErrorKind::MultiValue);
        }

        self.flush_effects();
        let index = self.pop_typed(ValType::I32)?;
        let args = self.call_args(sig)?.join(", ");
        let candidates: Vec<u32> = table
            .functions()
            .into_iter()
            .filter(|id| module.function(*id).is_some_and(|f| f.signature == *sig))
            .collect();

        let slot = self.temp();
        let read = if self.cfg.unsafe_access {
            format!(
                "unsafe {{ *self.table.get_unchecked(({} as u32) as usize) }}",
                index.expr
            )
        } else {
            format!(
                "self.table.get(({} as u32) as usize).copied().flatten()",
                index.expr
            )
        };
        self.stmt(&format!("let {slot}: Option<u32> = {read};"));

        let result = sig.result().map(|ty| (self.temp(), ty));
        let indent = self.indent();
        match &result {
            Some((name, ty)) => self.line(indent, &format!("let {name}: {ty} = match {slot} {{")),
            None => self.line(indent, &format!("match {slot} {{")),
        }
        for id in candidates {
            self.line(indent + 1, &format!("Some({id}) => self.f{id}({args})?,"));
        }
        if self.cfg.unsafe_access {
            self.line(indent + 1, "_ => unsafe { std::hint::unreachable_unchecked() },");
        } else {
            self.line(indent + 1, "Some(_) => return Err(Trap::IndirectCallTypeMismatch),");
            self.line(indent + 1, "None => return Err(Trap::UndefinedElement),");
        }
        self.line(indent, "};");

        if let Some((name, ty)) = result {
            self.push(Operand::temp(name, ty));
        }
        Ok(())
    }

    fn select(&mut self) -> Result<()> {
        let len = self.stack.len();
        let top = len.saturating_sub(3).max(self.frame().height);
        if self.stack[top..].iter().any(|o| o.may_trap) {
            self.flush_where(|o| o.may_trap);
        }
        let cond = self.pop_typed(ValType::I32)?;
        let b = self.pop()?;
        let a = self.pop()?;
        if a.ty != b.ty {
            return Err(FunctionErrorKind::SelectMismatch(a.ty, b.ty));
        }
        let rendered = Rendered {
            expr: format!("(if {} {{ {} }} else {{ {} }})", cond.truth(), a.expr, b.expr),
            truth: None,
            may_trap: false,
        };
        let ty = a.ty;
        self.push(Operand::derived(rendered, ty, &[&a, &b, &cond]));
        Ok(())
    }
}

fn check_type(expected: ValType, found: ValType) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(FunctionErrorKind::TypeMismatch { expected, found })
    }
}

/// Rust return type of a generated function.
pub(crate) fn result_type(sig: &Signature) -> String {
    match sig.result() {
        Some(ty) => format!("Result<{ty}, Trap>"),
        None => "Result<(), Trap>".to_string(),
    }
}

/// Generate the artifact for one function.
///
/// # Errors
///
/// Returns an error locating the first invalid instruction.
pub fn gen_function(
    module: &Module,
    cfg: &EmitConfig,
    func: &Function,
) -> std::result::Result<String, FunctionError> {
    FunctionEmitter::new(module, cfg, func).emit()
}

#[cfg(test)]
mod tests;
