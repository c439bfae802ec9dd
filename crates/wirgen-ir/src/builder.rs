//! Module builder fluent API.

use crate::instr::Instr;
use crate::module::{
    DataSegment, ElementSegment, ExportedFunction, Function, Global, ImportedFunction, Memory,
    Module, Table,
};
use crate::types::{Signature, ValType};

/// Builder for IR modules.
///
/// Function ids are assigned densely in insertion order.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next added function will receive.
    #[must_use]
    pub fn next_function_id(&self) -> u32 {
        u32::try_from(self.module.functions.len()).unwrap_or(u32::MAX)
    }

    /// Add a `call_indirect` signature.
    #[must_use]
    pub fn signature(mut self, sig: Signature) -> Self {
        self.module.types.push(sig);
        self
    }

    /// Add a defined function.
    #[must_use]
    pub fn function(mut self, sig: Signature, locals: Vec<ValType>, body: Vec<Instr>) -> Self {
        let id = self.next_function_id();
        self.module.functions.push(Function::new(id, sig, locals, body));
        self
    }

    /// Add a global.
    #[must_use]
    pub fn global(mut self, global: Global) -> Self {
        self.module.globals.push(global);
        self
    }

    /// Declare the linear memory.
    #[must_use]
    pub fn memory(mut self, initial: u32, maximum: Option<u32>) -> Self {
        self.module.memory = Some(Memory::new(initial, maximum));
        self
    }

    /// Add a data segment. Declares a one-page memory if none exists yet.
    #[must_use]
    pub fn data(mut self, offset: u32, bytes: impl Into<Vec<u8>>) -> Self {
        self.module
            .memory
            .get_or_insert_with(|| Memory::new(1, None))
            .data
            .push(DataSegment {
                offset,
                bytes: bytes.into(),
            });
        self
    }

    /// Declare the table size.
    #[must_use]
    pub fn table(mut self, initial: u32) -> Self {
        self.module.table.get_or_insert_with(Table::default).initial = initial;
        self
    }

    /// Add an element segment.
    #[must_use]
    pub fn elements(mut self, offset: u32, funcs: impl Into<Vec<u32>>) -> Self {
        self.module
            .table
            .get_or_insert_with(Table::default)
            .elements
            .push(ElementSegment {
                offset,
                funcs: funcs.into(),
            });
        self
    }

    /// Add an imported function.
    #[must_use]
    pub fn import(mut self, module: &str, field: &str, sig: Signature) -> Self {
        self.module.imported_functions.push(ImportedFunction {
            module: module.to_string(),
            field: field.to_string(),
            signature: sig,
        });
        self
    }

    /// Export a function under a name.
    #[must_use]
    pub fn export(mut self, name: &str, func: u32) -> Self {
        self.module.exported_functions.push(ExportedFunction {
            name: name.to_string(),
            func,
        });
        self
    }

    /// Set the start function.
    #[must_use]
    pub const fn start(mut self, func: u32) -> Self {
        self.module.start = Some(func);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Module {
        self.module
    }
}
