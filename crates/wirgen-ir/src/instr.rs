//! Stack-machine instruction set.

use std::fmt;

use crate::types::{BlockType, ValType, Value};

/// Defines an operator enum with its text name, a wire-order table and
/// index conversions.
macro_rules! operators {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// All operators, in wire index order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Text-format mnemonic (without the type prefix where one applies).
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Wire index.
            #[must_use]
            pub fn index(self) -> u8 {
                let pos = Self::ALL.iter().position(|op| *op == self).unwrap_or(0);
                u8::try_from(pos).unwrap_or(u8::MAX)
            }

            /// Operator for a wire index.
            #[must_use]
            pub fn from_index(index: u8) -> Option<Self> {
                Self::ALL.get(usize::from(index)).copied()
            }
        }
    };
}

operators! {
    /// Unary numeric operators (`<type>.<op>`).
    UnaryOp {
        Eqz => "eqz",
        Clz => "clz",
        Ctz => "ctz",
        Popcnt => "popcnt",
        Extend8S => "extend8_s",
        Extend16S => "extend16_s",
        Extend32S => "extend32_s",
        Abs => "abs",
        Neg => "neg",
        Ceil => "ceil",
        Floor => "floor",
        Trunc => "trunc",
        Nearest => "nearest",
        Sqrt => "sqrt",
    }
}

impl UnaryOp {
    /// Whether the operator exists for the given operand type.
    #[must_use]
    pub const fn valid_for(self, ty: ValType) -> bool {
        match self {
            Self::Eqz | Self::Clz | Self::Ctz | Self::Popcnt | Self::Extend8S | Self::Extend16S => {
                ty.is_int()
            }
            Self::Extend32S => matches!(ty, ValType::I64),
            _ => ty.is_float(),
        }
    }

    /// Result type for an operand of type `ty`.
    #[must_use]
    pub const fn result(self, ty: ValType) -> ValType {
        match self {
            Self::Eqz => ValType::I32,
            _ => ty,
        }
    }
}

operators! {
    /// Binary numeric operators (`<type>.<op>`).
    BinaryOp {
        Add => "add",
        Sub => "sub",
        Mul => "mul",
        DivS => "div_s",
        DivU => "div_u",
        RemS => "rem_s",
        RemU => "rem_u",
        And => "and",
        Or => "or",
        Xor => "xor",
        Shl => "shl",
        ShrS => "shr_s",
        ShrU => "shr_u",
        Rotl => "rotl",
        Rotr => "rotr",
        Div => "div",
        Min => "min",
        Max => "max",
        Copysign => "copysign",
        Eq => "eq",
        Ne => "ne",
        LtS => "lt_s",
        LtU => "lt_u",
        GtS => "gt_s",
        GtU => "gt_u",
        LeS => "le_s",
        LeU => "le_u",
        GeS => "ge_s",
        GeU => "ge_u",
        Lt => "lt",
        Gt => "gt",
        Le => "le",
        Ge => "ge",
    }
}

impl BinaryOp {
    /// Whether the operator exists for the given operand type.
    #[must_use]
    pub const fn valid_for(self, ty: ValType) -> bool {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Eq | Self::Ne => true,
            Self::Div | Self::Min | Self::Max | Self::Copysign => ty.is_float(),
            Self::Lt | Self::Gt | Self::Le | Self::Ge => ty.is_float(),
            _ => ty.is_int(),
        }
    }

    /// Comparison operators produce an `i32` truth value.
    #[must_use]
    pub const fn is_compare(self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::Ne
                | Self::LtS
                | Self::LtU
                | Self::GtS
                | Self::GtU
                | Self::LeS
                | Self::LeU
                | Self::GeS
                | Self::GeU
                | Self::Lt
                | Self::Gt
                | Self::Le
                | Self::Ge
        )
    }

    /// Result type for operands of type `ty`.
    #[must_use]
    pub const fn result(self, ty: ValType) -> ValType {
        if self.is_compare() { ValType::I32 } else { ty }
    }
}

operators! {
    /// Conversion operators (full mnemonic, including both types).
    ConvertOp {
        I32WrapI64 => "i32.wrap_i64",
        I32TruncF32S => "i32.trunc_f32_s",
        I32TruncF32U => "i32.trunc_f32_u",
        I32TruncF64S => "i32.trunc_f64_s",
        I32TruncF64U => "i32.trunc_f64_u",
        I64ExtendI32S => "i64.extend_i32_s",
        I64ExtendI32U => "i64.extend_i32_u",
        I64TruncF32S => "i64.trunc_f32_s",
        I64TruncF32U => "i64.trunc_f32_u",
        I64TruncF64S => "i64.trunc_f64_s",
        I64TruncF64U => "i64.trunc_f64_u",
        F32ConvertI32S => "f32.convert_i32_s",
        F32ConvertI32U => "f32.convert_i32_u",
        F32ConvertI64S => "f32.convert_i64_s",
        F32ConvertI64U => "f32.convert_i64_u",
        F32DemoteF64 => "f32.demote_f64",
        F64ConvertI32S => "f64.convert_i32_s",
        F64ConvertI32U => "f64.convert_i32_u",
        F64ConvertI64S => "f64.convert_i64_s",
        F64ConvertI64U => "f64.convert_i64_u",
        F64PromoteF32 => "f64.promote_f32",
        I32ReinterpretF32 => "i32.reinterpret_f32",
        I64ReinterpretF64 => "i64.reinterpret_f64",
        F32ReinterpretI32 => "f32.reinterpret_i32",
        F64ReinterpretI64 => "f64.reinterpret_i64",
        I32TruncSatF32S => "i32.trunc_sat_f32_s",
        I32TruncSatF32U => "i32.trunc_sat_f32_u",
        I32TruncSatF64S => "i32.trunc_sat_f64_s",
        I32TruncSatF64U => "i32.trunc_sat_f64_u",
        I64TruncSatF32S => "i64.trunc_sat_f32_s",
        I64TruncSatF32U => "i64.trunc_sat_f32_u",
        I64TruncSatF64S => "i64.trunc_sat_f64_s",
        I64TruncSatF64U => "i64.trunc_sat_f64_u",
    }
}

/// Conversion semantics, independent of the operand types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvertKind {
    Wrap,
    ExtendS,
    ExtendU,
    TruncS,
    TruncU,
    TruncSatS,
    TruncSatU,
    ConvertS,
    ConvertU,
    Demote,
    Promote,
    Reinterpret,
}

impl ConvertOp {
    /// Operand and result types.
    #[must_use]
    pub const fn types(self) -> (ValType, ValType) {
        use ValType::{F32, F64, I32, I64};
        match self {
            Self::I32WrapI64 => (I64, I32),
            Self::I32TruncF32S | Self::I32TruncF32U => (F32, I32),
            Self::I32TruncF64S | Self::I32TruncF64U => (F64, I32),
            Self::I64ExtendI32S | Self::I64ExtendI32U => (I32, I64),
            Self::I64TruncF32S | Self::I64TruncF32U => (F32, I64),
            Self::I64TruncF64S | Self::I64TruncF64U => (F64, I64),
            Self::F32ConvertI32S | Self::F32ConvertI32U => (I32, F32),
            Self::F32ConvertI64S | Self::F32ConvertI64U => (I64, F32),
            Self::F32DemoteF64 => (F64, F32),
            Self::F64ConvertI32S | Self::F64ConvertI32U => (I32, F64),
            Self::F64ConvertI64S | Self::F64ConvertI64U => (I64, F64),
            Self::F64PromoteF32 => (F32, F64),
            Self::I32ReinterpretF32 => (F32, I32),
            Self::I64ReinterpretF64 => (F64, I64),
            Self::F32ReinterpretI32 => (I32, F32),
            Self::F64ReinterpretI64 => (I64, F64),
            Self::I32TruncSatF32S | Self::I32TruncSatF32U => (F32, I32),
            Self::I32TruncSatF64S | Self::I32TruncSatF64U => (F64, I32),
            Self::I64TruncSatF32S | Self::I64TruncSatF32U => (F32, I64),
            Self::I64TruncSatF64S | Self::I64TruncSatF64U => (F64, I64),
        }
    }

    /// Conversion kind.
    #[must_use]
    pub const fn kind(self) -> ConvertKind {
        match self {
            Self::I32WrapI64 => ConvertKind::Wrap,
            Self::I64ExtendI32S => ConvertKind::ExtendS,
            Self::I64ExtendI32U => ConvertKind::ExtendU,
            Self::I32TruncF32S | Self::I32TruncF64S | Self::I64TruncF32S | Self::I64TruncF64S => {
                ConvertKind::TruncS
            }
            Self::I32TruncF32U | Self::I32TruncF64U | Self::I64TruncF32U | Self::I64TruncF64U => {
                ConvertKind::TruncU
            }
            Self::I32TruncSatF32S
            | Self::I32TruncSatF64S
            | Self::I64TruncSatF32S
            | Self::I64TruncSatF64S => ConvertKind::TruncSatS,
            Self::I32TruncSatF32U
            | Self::I32TruncSatF64U
            | Self::I64TruncSatF32U
            | Self::I64TruncSatF64U => ConvertKind::TruncSatU,
            Self::F32ConvertI32S
            | Self::F32ConvertI64S
            | Self::F64ConvertI32S
            | Self::F64ConvertI64S => ConvertKind::ConvertS,
            Self::F32ConvertI32U
            | Self::F32ConvertI64U
            | Self::F64ConvertI32U
            | Self::F64ConvertI64U => ConvertKind::ConvertU,
            Self::F32DemoteF64 => ConvertKind::Demote,
            Self::F64PromoteF32 => ConvertKind::Promote,
            Self::I32ReinterpretF32
            | Self::I64ReinterpretF64
            | Self::F32ReinterpretI32
            | Self::F64ReinterpretI64 => ConvertKind::Reinterpret,
        }
    }
}

operators! {
    /// Memory loads.
    LoadOp {
        I32Load => "i32.load",
        I64Load => "i64.load",
        F32Load => "f32.load",
        F64Load => "f64.load",
        I32Load8S => "i32.load8_s",
        I32Load8U => "i32.load8_u",
        I32Load16S => "i32.load16_s",
        I32Load16U => "i32.load16_u",
        I64Load8S => "i64.load8_s",
        I64Load8U => "i64.load8_u",
        I64Load16S => "i64.load16_s",
        I64Load16U => "i64.load16_u",
        I64Load32S => "i64.load32_s",
        I64Load32U => "i64.load32_u",
    }
}

impl LoadOp {
    /// Type pushed onto the operand stack.
    #[must_use]
    pub const fn result(self) -> ValType {
        match self {
            Self::I32Load | Self::I32Load8S | Self::I32Load8U | Self::I32Load16S | Self::I32Load16U => {
                ValType::I32
            }
            Self::F32Load => ValType::F32,
            Self::F64Load => ValType::F64,
            _ => ValType::I64,
        }
    }

    /// Native type read from memory (`u8`, `i16`, `f32`, ...).
    #[must_use]
    pub const fn access(self) -> &'static str {
        match self {
            Self::I32Load => "i32",
            Self::I64Load => "i64",
            Self::F32Load => "f32",
            Self::F64Load => "f64",
            Self::I32Load8S | Self::I64Load8S => "i8",
            Self::I32Load8U | Self::I64Load8U => "u8",
            Self::I32Load16S | Self::I64Load16S => "i16",
            Self::I32Load16U | Self::I64Load16U => "u16",
            Self::I64Load32S => "i32",
            Self::I64Load32U => "u32",
        }
    }

    /// Access width in bytes.
    #[must_use]
    pub const fn width(self) -> u32 {
        match self {
            Self::I32Load8S | Self::I32Load8U | Self::I64Load8S | Self::I64Load8U => 1,
            Self::I32Load16S | Self::I32Load16U | Self::I64Load16S | Self::I64Load16U => 2,
            Self::I32Load | Self::F32Load | Self::I64Load32S | Self::I64Load32U => 4,
            Self::I64Load | Self::F64Load => 8,
        }
    }
}

operators! {
    /// Memory stores.
    StoreOp {
        I32Store => "i32.store",
        I64Store => "i64.store",
        F32Store => "f32.store",
        F64Store => "f64.store",
        I32Store8 => "i32.store8",
        I32Store16 => "i32.store16",
        I64Store8 => "i64.store8",
        I64Store16 => "i64.store16",
        I64Store32 => "i64.store32",
    }
}

impl StoreOp {
    /// Type popped from the operand stack.
    #[must_use]
    pub const fn operand(self) -> ValType {
        match self {
            Self::I32Store | Self::I32Store8 | Self::I32Store16 => ValType::I32,
            Self::F32Store => ValType::F32,
            Self::F64Store => ValType::F64,
            Self::I64Store | Self::I64Store8 | Self::I64Store16 | Self::I64Store32 => ValType::I64,
        }
    }

    /// Native type written to memory.
    #[must_use]
    pub const fn access(self) -> &'static str {
        match self {
            Self::I32Store8 | Self::I64Store8 => "u8",
            Self::I32Store16 | Self::I64Store16 => "u16",
            Self::I32Store | Self::I64Store32 => "u32",
            Self::I64Store => "u64",
            Self::F32Store => "f32",
            Self::F64Store => "f64",
        }
    }

    /// Access width in bytes.
    #[must_use]
    pub const fn width(self) -> u32 {
        match self {
            Self::I32Store8 | Self::I64Store8 => 1,
            Self::I32Store16 | Self::I64Store16 => 2,
            Self::I32Store | Self::F32Store | Self::I64Store32 => 4,
            Self::I64Store | Self::F64Store => 8,
        }
    }
}

/// Memory access immediate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MemArg {
    /// Alignment hint (log2 bytes). Not semantically significant.
    pub align: u32,
    /// Constant byte offset added to the dynamic address.
    pub offset: u32,
}

impl MemArg {
    #[must_use]
    pub const fn offset(offset: u32) -> Self {
        Self { align: 0, offset }
    }
}

/// A single instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    Unreachable,
    Nop,
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    /// Branch to the frame `depth` levels up (0 = innermost).
    Br(u32),
    BrIf(u32),
    BrTable {
        targets: Vec<u32>,
        default: u32,
    },
    Return,
    /// Direct call by Function id.
    Call(u32),
    /// Call of an imported function by import index.
    CallImport(u32),
    /// Indirect call through the table, with the expected type index.
    CallIndirect(u32),
    Drop,
    Select,
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),
    Load(LoadOp, MemArg),
    Store(StoreOp, MemArg),
    MemorySize,
    MemoryGrow,
    Const(Value),
    Unary(ValType, UnaryOp),
    Binary(ValType, BinaryOp),
    Convert(ConvertOp),
}

impl Instr {
    /// Whether the instruction opens a control frame.
    #[must_use]
    pub const fn opens_frame(&self) -> bool {
        matches!(self, Self::Block(_) | Self::Loop(_) | Self::If(_))
    }
}

fn fmt_block_type(f: &mut fmt::Formatter<'_>, name: &str, ty: BlockType) -> fmt::Result {
    match ty {
        BlockType::Empty => f.write_str(name),
        BlockType::Value(ty) => write!(f, "{name} (result {ty})"),
    }
}

fn fmt_memarg(f: &mut fmt::Formatter<'_>, name: &str, arg: MemArg) -> fmt::Result {
    f.write_str(name)?;
    if arg.offset != 0 {
        write!(f, " offset={}", arg.offset)?;
    }
    Ok(())
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => f.write_str("unreachable"),
            Self::Nop => f.write_str("nop"),
            Self::Block(ty) => fmt_block_type(f, "block", *ty),
            Self::Loop(ty) => fmt_block_type(f, "loop", *ty),
            Self::If(ty) => fmt_block_type(f, "if", *ty),
            Self::Else => f.write_str("else"),
            Self::End => f.write_str("end"),
            Self::Br(depth) => write!(f, "br {depth}"),
            Self::BrIf(depth) => write!(f, "br_if {depth}"),
            Self::BrTable { targets, default } => {
                f.write_str("br_table")?;
                for target in targets {
                    write!(f, " {target}")?;
                }
                write!(f, " {default}")
            }
            Self::Return => f.write_str("return"),
            Self::Call(func) => write!(f, "call {func}"),
            Self::CallImport(index) => write!(f, "call_import {index}"),
            Self::CallIndirect(ty) => write!(f, "call_indirect (type {ty})"),
            Self::Drop => f.write_str("drop"),
            Self::Select => f.write_str("select"),
            Self::LocalGet(i) => write!(f, "local.get {i}"),
            Self::LocalSet(i) => write!(f, "local.set {i}"),
            Self::LocalTee(i) => write!(f, "local.tee {i}"),
            Self::GlobalGet(i) => write!(f, "global.get {i}"),
            Self::GlobalSet(i) => write!(f, "global.set {i}"),
            Self::Load(op, arg) => fmt_memarg(f, op.name(), *arg),
            Self::Store(op, arg) => fmt_memarg(f, op.name(), *arg),
            Self::MemorySize => f.write_str("memory.size"),
            Self::MemoryGrow => f.write_str("memory.grow"),
            Self::Const(v) => write!(f, "{}.const {v}", v.ty()),
            Self::Unary(ty, op) => write!(f, "{ty}.{}", op.name()),
            Self::Binary(ty, op) => write!(f, "{ty}.{}", op.name()),
            Self::Convert(op) => f.write_str(op.name()),
        }
    }
}
