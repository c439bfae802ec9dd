//! Value types, constants and function signatures.

use std::fmt;

/// WebAssembly value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
}

impl ValType {
    /// All value types, in wire tag order.
    pub const ALL: [Self; 4] = [Self::I32, Self::I64, Self::F32, Self::F64];

    /// Native Rust type name.
    #[must_use]
    pub const fn rust_type(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Unsigned Rust type of the same width (floats map to their bit type).
    #[must_use]
    pub const fn unsigned_type(self) -> &'static str {
        match self {
            Self::I32 | Self::F32 => "u32",
            Self::I64 | Self::F64 => "u64",
        }
    }

    /// Width in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::I32 | Self::F32 => 32,
            Self::I64 | Self::F64 => 64,
        }
    }

    #[must_use]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Zero value of this type.
    #[must_use]
    pub const fn zero(self) -> Value {
        match self {
            Self::I32 => Value::I32(0),
            Self::I64 => Value::I64(0),
            Self::F32 => Value::F32(0),
            Self::F64 => Value::F64(0),
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Constant value.
///
/// Floats are kept as raw bits so that NaN payloads and signed zeros are
/// preserved exactly through decoding and code generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
}

impl Value {
    /// Create an `f32` constant from a float.
    #[must_use]
    pub const fn f32(v: f32) -> Self {
        Self::F32(v.to_bits())
    }

    /// Create an `f64` constant from a float.
    #[must_use]
    pub const fn f64(v: f64) -> Self {
        Self::F64(v.to_bits())
    }

    /// Type of this value.
    #[must_use]
    pub const fn ty(self) -> ValType {
        match self {
            Self::I32(_) => ValType::I32,
            Self::I64(_) => ValType::I64,
            Self::F32(_) => ValType::F32,
            Self::F64(_) => ValType::F64,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(bits) => write!(f, "{:?}", f32::from_bits(bits)),
            Self::F64(bits) => write!(f, "{:?}", f64::from_bits(bits)),
        }
    }
}

/// Function signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

impl Signature {
    /// Create a signature.
    pub fn new(params: impl Into<Vec<ValType>>, results: impl Into<Vec<ValType>>) -> Self {
        Self {
            params: params.into(),
            results: results.into(),
        }
    }

    /// Single result type, if the signature has exactly one.
    #[must_use]
    pub fn result(&self) -> Option<ValType> {
        match self.results.as_slice() {
            [ty] => Some(*ty),
            _ => None,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, ty) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        f.write_str(") -> (")?;
        for (i, ty) in self.results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        f.write_str(")")
    }
}

/// Result type of a structured control instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlockType {
    #[default]
    Empty,
    Value(ValType),
}

impl BlockType {
    /// Result type, if any.
    #[must_use]
    pub const fn result(self) -> Option<ValType> {
        match self {
            Self::Empty => None,
            Self::Value(ty) => Some(ty),
        }
    }

    /// Number of values the construct produces.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Value(_) => 1,
        }
    }
}
