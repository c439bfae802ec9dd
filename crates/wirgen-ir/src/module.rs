//! Decoded module description.

use crate::instr::Instr;
use crate::types::{Signature, ValType, Value};

/// Root of the IR: everything the code generator consumes.
///
/// Constructed once by a decoder (or [`crate::ModuleBuilder`]) and treated
/// as read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Module {
    /// Signatures referenced by `call_indirect`.
    pub types: Vec<Signature>,
    /// Defined functions, in id order.
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
    pub memory: Option<Memory>,
    /// Indirect-call table.
    pub table: Option<Table>,
    pub imported_functions: Vec<ImportedFunction>,
    pub exported_functions: Vec<ExportedFunction>,
    /// Function run at the end of instantiation.
    pub start: Option<u32>,
}

impl Module {
    /// Look up a defined function by id.
    #[must_use]
    pub fn function(&self, id: u32) -> Option<&Function> {
        // Ids are dense, so try the direct slot before scanning.
        match self.functions.get(id as usize) {
            Some(f) if f.id == id => Some(f),
            _ => self.functions.iter().find(|f| f.id == id),
        }
    }

    /// Look up an imported function by index.
    #[must_use]
    pub fn import(&self, index: u32) -> Option<&ImportedFunction> {
        self.imported_functions.get(index as usize)
    }

    /// Look up a global by index.
    #[must_use]
    pub fn global(&self, index: u32) -> Option<&Global> {
        self.globals.get(index as usize)
    }

    /// Look up a `call_indirect` signature by type index.
    #[must_use]
    pub fn signature(&self, index: u32) -> Option<&Signature> {
        self.types.get(index as usize)
    }

    /// Whether the module declares a linear memory.
    #[must_use]
    pub const fn has_memory(&self) -> bool {
        self.memory.is_some()
    }

    /// Whether the module declares any imported functions.
    #[must_use]
    pub fn has_imports(&self) -> bool {
        !self.imported_functions.is_empty()
    }

    /// Total number of instructions across all function bodies.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.body.len()).sum()
    }
}

/// Defined function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Function {
    /// Dense id, unique within the module.
    pub id: u32,
    pub signature: Signature,
    /// Declared locals (after the parameters in the local index space).
    pub locals: Vec<ValType>,
    /// Instruction sequence, terminated by the function's final `end`.
    pub body: Vec<Instr>,
}

impl Function {
    /// Create a function.
    #[must_use]
    pub const fn new(id: u32, signature: Signature, locals: Vec<ValType>, body: Vec<Instr>) -> Self {
        Self {
            id,
            signature,
            locals,
            body,
        }
    }

    /// Type of a local (parameters first).
    #[must_use]
    pub fn local_type(&self, index: u32) -> Option<ValType> {
        let index = index as usize;
        let params = &self.signature.params;
        if index < params.len() {
            Some(params[index])
        } else {
            self.locals.get(index - params.len()).copied()
        }
    }

    /// Number of entries in the local index space.
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.signature.params.len() + self.locals.len()
    }
}

/// Global initializer expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitExpr {
    Const(Value),
    /// Value of an earlier global.
    Global(u32),
    /// Result of calling a nullary imported function at instantiation.
    Import(u32),
}

/// Global variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Global {
    pub ty: ValType,
    pub mutable: bool,
    pub init: InitExpr,
}

impl Global {
    /// Mutable global initialized to a constant.
    #[must_use]
    pub const fn mutable(value: Value) -> Self {
        Self {
            ty: value.ty(),
            mutable: true,
            init: InitExpr::Const(value),
        }
    }

    /// Immutable global initialized to a constant.
    #[must_use]
    pub const fn immutable(value: Value) -> Self {
        Self {
            ty: value.ty(),
            mutable: false,
            init: InitExpr::Const(value),
        }
    }
}

/// Bytes written into memory at instantiation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataSegment {
    pub offset: u32,
    pub bytes: Vec<u8>,
}

/// Linear memory descriptor (sizes in 64 KiB pages).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
    pub initial: u32,
    pub maximum: Option<u32>,
    pub data: Vec<DataSegment>,
}

impl Memory {
    /// Create a memory without data segments.
    #[must_use]
    pub const fn new(initial: u32, maximum: Option<u32>) -> Self {
        Self {
            initial,
            maximum,
            data: Vec::new(),
        }
    }
}

/// Function ids placed into the table at instantiation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementSegment {
    pub offset: u32,
    pub funcs: Vec<u32>,
}

/// Indirect-call table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    /// Number of slots.
    pub initial: u32,
    pub elements: Vec<ElementSegment>,
}

impl Table {
    /// Function ids reachable through the table, in slot order, without duplicates.
    #[must_use]
    pub fn functions(&self) -> Vec<u32> {
        let mut out: Vec<u32> = Vec::new();
        for func in self.elements.iter().flat_map(|seg| seg.funcs.iter()) {
            if !out.contains(func) {
                out.push(*func);
            }
        }
        out
    }
}

/// Host-provided function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedFunction {
    /// Host module name.
    pub module: String,
    /// Field name within the host module.
    pub field: String,
    pub signature: Signature,
}

/// Named entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedFunction {
    pub name: String,
    /// Function id.
    pub func: u32,
}
