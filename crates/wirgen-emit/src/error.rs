//! Generation errors.

use std::path::PathBuf;

use thiserror::Error;
use wirgen_ir::ValType;

/// Reason a function body could not be translated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FunctionErrorKind {
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValType, found: ValType },
    #[error("operands of select have different types ({0} and {1})")]
    SelectMismatch(ValType, ValType),
    #[error("operator {op} is not defined for {ty}")]
    InvalidOperator { op: &'static str, ty: ValType },
    #[error("branch depth {0} out of range")]
    BranchDepth(u32),
    #[error("br_table targets have different arities")]
    BranchArity,
    #[error("unknown function {0}")]
    UnknownFunction(u32),
    #[error("unknown import {0}")]
    UnknownImport(u32),
    #[error("unknown type {0}")]
    UnknownType(u32),
    #[error("unknown global {0}")]
    UnknownGlobal(u32),
    #[error("unknown local {0}")]
    UnknownLocal(u32),
    #[error("module has no memory")]
    MissingMemory,
    #[error("module has no table")]
    MissingTable,
    #[error("global {0} is immutable")]
    ImmutableGlobal(u32),
    #[error("else outside of if")]
    ElseWithoutIf,
    #[error("if with a result requires an else branch")]
    IfWithoutElse,
    #[error("missing end")]
    MissingEnd,
    #[error("instructions after the final end")]
    TrailingInstructions,
    #[error("expected {expected} values on the stack at end of block, found {found}")]
    UnbalancedStack { expected: usize, found: usize },
    #[error("multiple results are not supported")]
    MultiValue,
}

/// Function translation error, locating the failing instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("function {func} at instruction {offset}: {kind}")]
pub struct FunctionError {
    /// Function id.
    pub func: u32,
    /// Instruction index within the body.
    pub offset: usize,
    pub kind: FunctionErrorKind,
}

/// Generation errors.
#[derive(Error, Debug)]
pub enum EmitError {
    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error("package name `{0}` is not a valid identifier")]
    InvalidPackage(String),

    #[error("duplicate function id {0}")]
    DuplicateFunction(u32),

    #[error("{item} has more than one result")]
    MultiValue { item: String },

    #[error("global {global}: initializer refers to global {target}, which is not an earlier global")]
    GlobalForwardReference { global: u32, target: u32 },

    #[error("global {global}: initializer refers to unknown import {import}")]
    GlobalUnknownImport { global: u32, import: u32 },

    #[error("global {global}: expected initializer of type {expected}, found {found}")]
    GlobalTypeMismatch {
        global: u32,
        expected: ValType,
        found: ValType,
    },

    #[error("global {global}: import {import} must take no parameters and return one value")]
    GlobalImportSignature { global: u32, import: u32 },

    #[error("data segment {segment} ends at byte {end}, beyond initial memory of {size} bytes")]
    DataOutOfBounds { segment: usize, end: u64, size: u64 },

    #[error("element segment {segment} ends at slot {end}, beyond table of {size} slots")]
    ElementsOutOfBounds { segment: usize, end: u64, size: u32 },

    #[error("element segment {segment} refers to unknown function {func}")]
    UnknownElementFunction { segment: usize, func: u32 },

    #[error("start function {0} does not exist")]
    UnknownStartFunction(u32),

    #[error("start function {0} must take no parameters and return nothing")]
    StartSignature(u32),

    #[error("import {0} does not exist")]
    UnknownImport(u32),

    #[error("export `{name}` refers to unknown function {func}")]
    UnknownExportTarget { name: String, func: u32 },

    #[error("memory maximum {maximum} is below initial size {initial}")]
    MemoryLimits { initial: u32, maximum: u32 },

    #[error("memory of {0} pages exceeds the 65536 page limit")]
    MemoryTooLarge(u32),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EmitError>;
