//! Expression rendering.
//!
//! Every rendered expression is safe in postfix position (it is an atom, a
//! method call or parenthesized), so operators can be chained onto it
//! without further parentheses.

use wirgen_ir::{BinaryOp, ConvertKind, ConvertOp, LoadOp, StoreOp, UnaryOp, ValType, Value};

/// How an operand's value may be invalidated while it is pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    /// Literal.
    Const,
    /// `let`-bound temporary.
    Temp,
    /// Plain local read.
    Local,
    /// Anything else: arithmetic, global reads, memory reads.
    Expr,
}

/// Pending operand-stack entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Operand {
    pub expr: String,
    pub ty: ValType,
    pub kind: Kind,
    /// Locals the expression reads.
    pub locals: Vec<u32>,
    /// Evaluating the expression can trap.
    pub may_trap: bool,
    /// Boolean form of an `i32` truth value, for conditions.
    pub truth: Option<String>,
}

impl Operand {
    pub fn constant(value: Value) -> Self {
        Self {
            expr: render_value(value),
            ty: value.ty(),
            kind: Kind::Const,
            locals: Vec::new(),
            may_trap: false,
            truth: None,
        }
    }

    pub fn temp(name: String, ty: ValType) -> Self {
        Self {
            expr: name,
            ty,
            kind: Kind::Temp,
            locals: Vec::new(),
            may_trap: false,
            truth: None,
        }
    }

    pub fn local(index: u32, ty: ValType) -> Self {
        Self {
            expr: format!("l{index}"),
            ty,
            kind: Kind::Local,
            locals: vec![index],
            may_trap: false,
            truth: None,
        }
    }

    pub fn global(index: u32, ty: ValType) -> Self {
        Self {
            expr: format!("self.g{index}"),
            ty,
            kind: Kind::Expr,
            locals: Vec::new(),
            may_trap: false,
            truth: None,
        }
    }

    /// Expression computed from `inputs`.
    pub fn derived(rendered: Rendered, ty: ValType, inputs: &[&Self]) -> Self {
        let mut locals: Vec<u32> = Vec::new();
        for input in inputs {
            for local in &input.locals {
                if !locals.contains(local) {
                    locals.push(*local);
                }
            }
        }
        Self {
            expr: rendered.expr,
            ty,
            kind: Kind::Expr,
            locals,
            may_trap: rendered.may_trap || inputs.iter().any(|i| i.may_trap),
            truth: rendered.truth,
        }
    }

    /// Constants and temporaries never change once pushed.
    pub const fn is_stable(&self) -> bool {
        matches!(self.kind, Kind::Const | Kind::Temp)
    }

    pub fn reads(&self, local: u32) -> bool {
        self.locals.contains(&local)
    }

    /// Condition form: `x != 0`, or the comparison it came from.
    pub fn truth(&self) -> String {
        self.truth
            .clone()
            .unwrap_or_else(|| format!("{} != 0", self.expr))
    }
}

/// Rendered operator application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Rendered {
    pub expr: String,
    pub truth: Option<String>,
    pub may_trap: bool,
}

impl Rendered {
    fn pure(expr: String) -> Self {
        Self {
            expr,
            truth: None,
            may_trap: false,
        }
    }

    fn trapping(expr: String) -> Self {
        Self {
            expr,
            truth: None,
            may_trap: true,
        }
    }

    fn compare(truth: String) -> Self {
        Self {
            expr: format!("(({truth}) as i32)"),
            truth: Some(truth),
            may_trap: false,
        }
    }
}

/// Literal with an explicit type suffix.
pub(crate) fn render_value(value: Value) -> String {
    match value {
        Value::I32(v) if v < 0 => format!("({v}i32)"),
        Value::I32(v) => format!("{v}i32"),
        Value::I64(v) if v < 0 => format!("({v}i64)"),
        Value::I64(v) => format!("{v}i64"),
        Value::F32(bits) => {
            let v = f32::from_bits(bits);
            render_float(
                "f32",
                v.is_nan(),
                v.is_infinite(),
                v.is_sign_negative(),
                &format!("{v:?}"),
                &format!("{bits:#010x}"),
            )
        }
        Value::F64(bits) => {
            let v = f64::from_bits(bits);
            render_float(
                "f64",
                v.is_nan(),
                v.is_infinite(),
                v.is_sign_negative(),
                &format!("{v:?}"),
                &format!("{bits:#018x}"),
            )
        }
    }
}

fn render_float(
    ty: &str,
    nan: bool,
    infinite: bool,
    negative: bool,
    debug: &str,
    bits: &str,
) -> String {
    if nan {
        // Payload and sign are kept exactly.
        format!("{ty}::from_bits({bits})")
    } else if infinite {
        if negative {
            format!("(-{ty}::INFINITY)")
        } else {
            format!("{ty}::INFINITY")
        }
    } else if negative {
        format!("({debug}{ty})")
    } else {
        format!("{debug}{ty}")
    }
}

/// Render a unary operator applied to `a`.
pub(crate) fn unary(ty: ValType, op: UnaryOp, a: &str) -> Rendered {
    let t = ty.rust_type();
    match op {
        UnaryOp::Eqz => Rendered::compare(format!("{a} == 0")),
        UnaryOp::Clz => Rendered::pure(format!("({a}.leading_zeros() as {t})")),
        UnaryOp::Ctz => Rendered::pure(format!("({a}.trailing_zeros() as {t})")),
        UnaryOp::Popcnt => Rendered::pure(format!("({a}.count_ones() as {t})")),
        UnaryOp::Extend8S => Rendered::pure(format!("({a} as i8 as {t})")),
        UnaryOp::Extend16S => Rendered::pure(format!("({a} as i16 as {t})")),
        UnaryOp::Extend32S => Rendered::pure(format!("({a} as i32 as {t})")),
        UnaryOp::Abs => Rendered::pure(format!("{a}.abs()")),
        UnaryOp::Neg => Rendered::pure(format!("(-{a})")),
        UnaryOp::Ceil => Rendered::pure(format!("{a}.ceil()")),
        UnaryOp::Floor => Rendered::pure(format!("{a}.floor()")),
        UnaryOp::Trunc => Rendered::pure(format!("{a}.trunc()")),
        UnaryOp::Nearest => Rendered::pure(format!("{a}.round_ties_even()")),
        UnaryOp::Sqrt => Rendered::pure(format!("{a}.sqrt()")),
    }
}

/// Render a binary operator applied to `a` and `b`.
pub(crate) fn binary(ty: ValType, op: BinaryOp, a: &str, b: &str) -> Rendered {
    let t = ty.rust_type();
    let u = ty.unsigned_type();
    let bits = ty.bits();
    match op {
        BinaryOp::Add if ty.is_int() => Rendered::pure(format!("{a}.wrapping_add({b})")),
        BinaryOp::Sub if ty.is_int() => Rendered::pure(format!("{a}.wrapping_sub({b})")),
        BinaryOp::Mul if ty.is_int() => Rendered::pure(format!("{a}.wrapping_mul({b})")),
        BinaryOp::Add => Rendered::pure(format!("({a} + {b})")),
        BinaryOp::Sub => Rendered::pure(format!("({a} - {b})")),
        BinaryOp::Mul => Rendered::pure(format!("({a} * {b})")),
        BinaryOp::Div => Rendered::pure(format!("({a} / {b})")),
        BinaryOp::DivS => Rendered::trapping(format!("{t}_div_s({a}, {b})?")),
        BinaryOp::DivU => Rendered::trapping(format!("{t}_div_u({a}, {b})?")),
        BinaryOp::RemS => Rendered::trapping(format!("{t}_rem_s({a}, {b})?")),
        BinaryOp::RemU => Rendered::trapping(format!("{t}_rem_u({a}, {b})?")),
        BinaryOp::And => Rendered::pure(format!("({a} & {b})")),
        BinaryOp::Or => Rendered::pure(format!("({a} | {b})")),
        BinaryOp::Xor => Rendered::pure(format!("({a} ^ {b})")),
        BinaryOp::Shl => Rendered::pure(format!("{a}.wrapping_shl(({b} as u32))")),
        BinaryOp::ShrS => Rendered::pure(format!("{a}.wrapping_shr(({b} as u32))")),
        BinaryOp::ShrU => Rendered::pure(format!("(({a} as {u}).wrapping_shr(({b} as u32)) as {t})")),
        BinaryOp::Rotl => Rendered::pure(format!("{a}.rotate_left((({b} as u32) % {bits}))")),
        BinaryOp::Rotr => Rendered::pure(format!("{a}.rotate_right((({b} as u32) % {bits}))")),
        BinaryOp::Min => Rendered::pure(format!("{t}_min({a}, {b})")),
        BinaryOp::Max => Rendered::pure(format!("{t}_max({a}, {b})")),
        BinaryOp::Copysign => Rendered::pure(format!("{a}.copysign({b})")),
        BinaryOp::Eq => Rendered::compare(format!("{a} == {b}")),
        BinaryOp::Ne => Rendered::compare(format!("{a} != {b}")),
        BinaryOp::LtS | BinaryOp::Lt => Rendered::compare(format!("{a} < {b}")),
        BinaryOp::GtS | BinaryOp::Gt => Rendered::compare(format!("{a} > {b}")),
        BinaryOp::LeS | BinaryOp::Le => Rendered::compare(format!("{a} <= {b}")),
        BinaryOp::GeS | BinaryOp::Ge => Rendered::compare(format!("{a} >= {b}")),
        BinaryOp::LtU => Rendered::compare(format!("({a} as {u}) < ({b} as {u})")),
        BinaryOp::GtU => Rendered::compare(format!("({a} as {u}) > ({b} as {u})")),
        BinaryOp::LeU => Rendered::compare(format!("({a} as {u}) <= ({b} as {u})")),
        BinaryOp::GeU => Rendered::compare(format!("({a} as {u}) >= ({b} as {u})")),
    }
}

/// Render a conversion of `a`.
pub(crate) fn convert(op: ConvertOp, a: &str) -> Rendered {
    let (from, to) = op.types();
    let f = from.rust_type();
    let t = to.rust_type();
    match op.kind() {
        ConvertKind::Wrap | ConvertKind::ExtendS | ConvertKind::Demote | ConvertKind::Promote => {
            Rendered::pure(format!("({a} as {t})"))
        }
        ConvertKind::ExtendU => Rendered::pure(format!("({a} as u32 as {t})")),
        ConvertKind::TruncS => Rendered::trapping(format!("{t}_trunc_{f}_s({a})?")),
        ConvertKind::TruncU => Rendered::trapping(format!("{t}_trunc_{f}_u({a})?")),
        ConvertKind::TruncSatS | ConvertKind::ConvertS => Rendered::pure(format!("({a} as {t})")),
        ConvertKind::TruncSatU => Rendered::pure(format!("({a} as {} as {t})", to.unsigned_type())),
        ConvertKind::ConvertU => Rendered::pure(format!("({a} as {} as {t})", from.unsigned_type())),
        ConvertKind::Reinterpret if to.is_int() => Rendered::pure(format!("({a}.to_bits() as {t})")),
        ConvertKind::Reinterpret => {
            Rendered::pure(format!("{t}::from_bits(({a} as {}))", to.unsigned_type()))
        }
    }
}

/// Render a memory load from address operand `addr`.
pub(crate) fn load(op: LoadOp, addr: &str, offset: u32, unchecked: bool) -> Rendered {
    let access = op.access();
    let result = op.result().rust_type();
    let read = if unchecked {
        format!("unsafe {{ self.mem.load_{access}_unchecked(({addr} as u32), {offset}) }}")
    } else {
        format!("self.mem.load_{access}(({addr} as u32), {offset})?")
    };
    let expr = if access == result {
        if unchecked { format!("({read})") } else { read }
    } else {
        format!("({read} as {result})")
    };
    Rendered {
        expr,
        truth: None,
        may_trap: !unchecked,
    }
}

/// Render a memory store statement.
pub(crate) fn store(op: StoreOp, addr: &str, value: &str, offset: u32, unchecked: bool) -> String {
    let access = op.access();
    let value = if access == op.operand().rust_type() || op.operand().is_float() {
        value.to_string()
    } else {
        format!("({value} as {access})")
    };
    if unchecked {
        format!("unsafe {{ self.mem.store_{access}_unchecked(({addr} as u32), {offset}, {value}) }};")
    } else {
        format!("self.mem.store_{access}(({addr} as u32), {offset}, {value})?;")
    }
}
