//! Instance context code generation.
//!
//! Generates `context.rs` containing the `Trap` type, the `Context` struct
//! holding host, memory, globals and table, the instantiation sequence, and
//! the numeric helpers function bodies call for trapping arithmetic.

use std::fmt::Write;

use tracing::debug;
use wirgen_ir::{InitExpr, Module, ValType};

use crate::config::EmitConfig;
use crate::error::{EmitError, Result};
use crate::expr::render_value;
use crate::header::{byte_rows, file_header};
use crate::memory::{PAGE_SIZE, max_pages};

/// Trap variants and their messages.
const TRAPS: &[(&str, &str, &str)] = &[
    ("Unreachable", "unreachable executed", "`unreachable` executed."),
    (
        "MemoryOutOfBounds",
        "out of bounds memory access",
        "Memory access outside the current size.",
    ),
    ("DivisionByZero", "integer divide by zero", "Integer division or remainder by zero."),
    ("IntegerOverflow", "integer overflow", "Signed division overflow or out-of-range truncation."),
    ("InvalidConversion", "invalid conversion to integer", "Truncation of NaN."),
    ("UndefinedElement", "undefined element", "Indirect call through an empty or missing table slot."),
    (
        "IndirectCallTypeMismatch",
        "indirect call type mismatch",
        "Indirect call target has a different signature.",
    ),
    ("OutOfMemory", "out of memory", "Memory could not be allocated."),
    ("Host", "host error", "Raised by an imported function."),
];

/// Trapping float-to-int truncations: (name, from, to, exclusive bounds, unsigned).
const TRUNCATIONS: &[(&str, &str, &str, &str, &str, bool)] = &[
    ("i32_trunc_f32_s", "f32", "i32", "-2147483904.0", "2147483648.0", false),
    ("i32_trunc_f32_u", "f32", "i32", "-1.0", "4294967296.0", true),
    ("i32_trunc_f64_s", "f64", "i32", "-2147483649.0", "2147483648.0", false),
    ("i32_trunc_f64_u", "f64", "i32", "-1.0", "4294967296.0", true),
    (
        "i64_trunc_f32_s",
        "f32",
        "i64",
        "-9223373136366403584.0",
        "9223372036854775808.0",
        false,
    ),
    ("i64_trunc_f32_u", "f32", "i64", "-1.0", "18446744073709551616.0", true),
    (
        "i64_trunc_f64_s",
        "f64",
        "i64",
        "-9223372036854777856.0",
        "9223372036854775808.0",
        false,
    ),
    ("i64_trunc_f64_u", "f64", "i64", "-1.0", "18446744073709551616.0", true),
];

/// Check the module-level invariants the instantiation sequence relies on.
fn validate(module: &Module) -> Result<()> {
    for (i, global) in module.globals.iter().enumerate() {
        let index = index_u32(i);
        match global.init {
            InitExpr::Const(value) => {
                if value.ty() != global.ty {
                    return Err(EmitError::GlobalTypeMismatch {
                        global: index,
                        expected: global.ty,
                        found: value.ty(),
                    });
                }
            }
            InitExpr::Global(target) => {
                if target >= index {
                    return Err(EmitError::GlobalForwardReference {
                        global: index,
                        target,
                    });
                }
                let found = module.globals[target as usize].ty;
                if found != global.ty {
                    return Err(EmitError::GlobalTypeMismatch {
                        global: index,
                        expected: global.ty,
                        found,
                    });
                }
            }
            InitExpr::Import(import) => {
                let Some(imported) = module.import(import) else {
                    return Err(EmitError::GlobalUnknownImport {
                        global: index,
                        import,
                    });
                };
                if !imported.signature.params.is_empty() || imported.signature.results.len() != 1 {
                    return Err(EmitError::GlobalImportSignature {
                        global: index,
                        import,
                    });
                }
                let found = imported.signature.results[0];
                if found != global.ty {
                    return Err(EmitError::GlobalTypeMismatch {
                        global: index,
                        expected: global.ty,
                        found,
                    });
                }
            }
        }
    }

    if let Some(memory) = &module.memory {
        max_pages(memory)?;
        let size = u64::from(memory.initial) * PAGE_SIZE;
        for (segment, data) in memory.data.iter().enumerate() {
            let end = u64::from(data.offset) + data.bytes.len() as u64;
            if end > size {
                return Err(EmitError::DataOutOfBounds { segment, end, size });
            }
        }
    }

    if let Some(table) = &module.table {
        for (segment, elements) in table.elements.iter().enumerate() {
            let end = u64::from(elements.offset) + elements.funcs.len() as u64;
            if end > u64::from(table.initial) {
                return Err(EmitError::ElementsOutOfBounds {
                    segment,
                    end,
                    size: table.initial,
                });
            }
            if let Some(&func) = elements.funcs.iter().find(|&&f| module.function(f).is_none()) {
                return Err(EmitError::UnknownElementFunction { segment, func });
            }
        }
    }

    if let Some(start) = module.start {
        let Some(func) = module.function(start) else {
            return Err(EmitError::UnknownStartFunction(start));
        };
        if !func.signature.params.is_empty() || !func.signature.results.is_empty() {
            return Err(EmitError::StartSignature(start));
        }
    }

    Ok(())
}

fn index_u32(i: usize) -> u32 {
    u32::try_from(i).unwrap_or(u32::MAX)
}

/// Generate `context.rs`.
///
/// # Errors
///
/// Returns an error if a global initializer, data segment, element segment
/// or the start function is invalid.
pub fn gen_context(module: &Module, cfg: &EmitConfig) -> Result<String> {
    validate(module)?;
    debug!(
        globals = module.globals.len(),
        imports = module.imported_functions.len(),
        table = module.table.is_some(),
        "generating context"
    );

    let mut out = file_header(cfg, "Instance state, traps and numeric helpers.");
    out.push_str("\n#![allow(dead_code, unused_mut, clippy::all)]\n\n");
    if module.has_imports() {
        out.push_str("use super::imports::Imports;\n");
    }
    if module.has_memory() {
        out.push_str("use super::mem::Memory;\n");
    }
    if module.has_imports() || module.has_memory() {
        out.push('\n');
    }

    gen_trap(&mut out);
    gen_data(&mut out, module);
    gen_struct(&mut out, module);
    gen_instantiate(&mut out, module);
    gen_helpers(&mut out);
    Ok(out)
}

fn gen_trap(out: &mut String) {
    out.push_str("/// Reason execution stopped abnormally.\n");
    out.push_str("#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]\n");
    out.push_str("pub enum Trap {\n");
    for (name, _, doc) in TRAPS {
        let _ = writeln!(out, "    /// {doc}");
        let _ = writeln!(out, "    {name},");
    }
    out.push_str("}\n\n");

    out.push_str("impl std::fmt::Display for Trap {\n");
    out.push_str("    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {\n");
    out.push_str("        let message = match self {\n");
    for (name, message, _) in TRAPS {
        let _ = writeln!(out, "            Self::{name} => \"{message}\",");
    }
    out.push_str("        };\n");
    out.push_str("        f.write_str(message)\n");
    out.push_str("    }\n");
    out.push_str("}\n\n");
    out.push_str("impl std::error::Error for Trap {}\n\n");
}

fn gen_data(out: &mut String, module: &Module) {
    if let Some(memory) = &module.memory {
        for (i, segment) in memory.data.iter().enumerate() {
            let _ = writeln!(out, "static DATA_{i}: [u8; {}] = [", segment.bytes.len());
            out.push_str(&byte_rows(&segment.bytes, "    "));
            out.push_str("];\n\n");
        }
    }
    if let Some(table) = &module.table {
        for (i, segment) in table.elements.iter().enumerate() {
            let funcs: Vec<String> = segment.funcs.iter().map(u32::to_string).collect();
            let _ = writeln!(
                out,
                "static ELEM_{i}: [u32; {}] = [{}];\n",
                funcs.len(),
                funcs.join(", ")
            );
        }
    }
}

fn gen_struct(out: &mut String, module: &Module) {
    out.push_str("/// Module instance.\n");
    if module.has_imports() {
        out.push_str("pub struct Context<H: Imports> {\n");
        out.push_str("    pub(crate) host: H,\n");
    } else {
        out.push_str("pub struct Context {\n");
    }
    if module.has_memory() {
        out.push_str("    pub(crate) mem: Memory,\n");
    }
    for (i, global) in module.globals.iter().enumerate() {
        let _ = writeln!(out, "    pub(crate) g{i}: {},", global.ty.rust_type());
    }
    if module.table.is_some() {
        out.push_str("    pub(crate) table: Vec<Option<u32>>,\n");
    }
    out.push_str("}\n\n");
}

fn gen_instantiate(out: &mut String, module: &Module) {
    let _ = writeln!(out, "{}", crate::header::context_impl(module));
    out.push_str("    /// Instantiate: allocate memory, copy data segments, initialize\n");
    out.push_str("    /// globals, fill the table, then run the start function.\n");
    if module.has_imports() {
        out.push_str("    pub fn new(host: H) -> Result<Self, Trap> {\n");
    } else {
        out.push_str("    pub fn new() -> Result<Self, Trap> {\n");
    }
    out.push_str("        let mut ctx = Self {\n");
    if module.has_imports() {
        out.push_str("            host,\n");
    }
    if module.has_memory() {
        out.push_str("            mem: Memory::new()?,\n");
    }
    for (i, global) in module.globals.iter().enumerate() {
        let _ = writeln!(out, "            g{i}: {},", render_value(global.ty.zero()));
    }
    if let Some(table) = &module.table {
        let _ = writeln!(out, "            table: vec![None; {}],", table.initial);
    }
    out.push_str("        };\n");

    if let Some(memory) = &module.memory {
        for (i, segment) in memory.data.iter().enumerate() {
            let _ = writeln!(out, "        ctx.mem.init_data({}, &DATA_{i})?;", segment.offset);
        }
    }
    for (i, global) in module.globals.iter().enumerate() {
        let value = match global.init {
            InitExpr::Const(value) => render_value(value),
            InitExpr::Global(target) => format!("ctx.g{target}"),
            InitExpr::Import(import) => format!("ctx.i{import}()?"),
        };
        let _ = writeln!(out, "        ctx.g{i} = {value};");
    }
    if let Some(table) = &module.table {
        for (i, segment) in table.elements.iter().enumerate() {
            let start = segment.offset as usize;
            let end = start + segment.funcs.len();
            let _ = writeln!(
                out,
                "        for (slot, func) in ctx.table[{start}..{end}].iter_mut().zip(ELEM_{i}) {{"
            );
            out.push_str("            *slot = Some(func);\n");
            out.push_str("        }\n");
        }
    }
    if let Some(start) = module.start {
        let _ = writeln!(out, "        ctx.f{start}()?;");
    }
    out.push_str("        Ok(ctx)\n");
    out.push_str("    }\n");

    if module.has_memory() {
        out.push_str(
            "\n    pub fn memory(&self) -> &Memory {\n        &self.mem\n    }\n\n    pub fn memory_mut(&mut self) -> &mut Memory {\n        &mut self.mem\n    }\n",
        );
    }
    if module.has_imports() {
        out.push_str(
            "\n    pub fn host(&self) -> &H {\n        &self.host\n    }\n\n    pub fn host_mut(&mut self) -> &mut H {\n        &mut self.host\n    }\n",
        );
    }
    out.push_str("}\n");
}

fn gen_helpers(out: &mut String) {
    for ty in [ValType::I32, ValType::I64] {
        let t = ty.rust_type();
        let u = ty.unsigned_type();
        let _ = write!(
            out,
            r"
pub(crate) fn {t}_div_s(a: {t}, b: {t}) -> Result<{t}, Trap> {{
    if b == 0 {{
        return Err(Trap::DivisionByZero);
    }}
    if a == {t}::MIN && b == -1 {{
        return Err(Trap::IntegerOverflow);
    }}
    Ok(a / b)
}}

pub(crate) fn {t}_div_u(a: {t}, b: {t}) -> Result<{t}, Trap> {{
    if b == 0 {{
        return Err(Trap::DivisionByZero);
    }}
    Ok(((a as {u}) / (b as {u})) as {t})
}}

pub(crate) fn {t}_rem_s(a: {t}, b: {t}) -> Result<{t}, Trap> {{
    if b == 0 {{
        return Err(Trap::DivisionByZero);
    }}
    Ok(a.wrapping_rem(b))
}}

pub(crate) fn {t}_rem_u(a: {t}, b: {t}) -> Result<{t}, Trap> {{
    if b == 0 {{
        return Err(Trap::DivisionByZero);
    }}
    Ok(((a as {u}) % (b as {u})) as {t})
}}
"
        );
    }

    for &(name, from, to, lower, upper, unsigned) in TRUNCATIONS {
        let cast = if unsigned {
            format!("x as u{} as {to}", &to[1..])
        } else {
            format!("x as {to}")
        };
        let _ = write!(
            out,
            r"
pub(crate) fn {name}(x: {from}) -> Result<{to}, Trap> {{
    if x.is_nan() {{
        return Err(Trap::InvalidConversion);
    }}
    if !(x > {lower} && x < {upper}) {{
        return Err(Trap::IntegerOverflow);
    }}
    Ok({cast})
}}
"
        );
    }

    for ty in [ValType::F32, ValType::F64] {
        let t = ty.rust_type();
        let _ = write!(
            out,
            r"
pub(crate) fn {t}_min(a: {t}, b: {t}) -> {t} {{
    if a.is_nan() || b.is_nan() {{
        return a + b;
    }}
    if a == b {{
        return if a.is_sign_negative() {{ a }} else {{ b }};
    }}
    if a < b {{ a }} else {{ b }}
}}

pub(crate) fn {t}_max(a: {t}, b: {t}) -> {t} {{
    if a.is_nan() || b.is_nan() {{
        return a + b;
    }}
    if a == b {{
        return if a.is_sign_positive() {{ a }} else {{ b }};
    }}
    if a > b {{ a }} else {{ b }}
}}
"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirgen_ir::{Global, Instr, ModuleBuilder, Signature, Value};

    fn unit() -> Signature {
        Signature::default()
    }

    #[test]
    fn trap_enum_and_helpers() {
        let out = gen_context(&Module::default(), &EmitConfig::default()).expect("gen");
        assert!(out.contains("pub enum Trap {"));
        assert!(out.contains("Self::DivisionByZero => \"integer divide by zero\","));
        assert!(out.contains("impl std::error::Error for Trap {}"));
        assert!(out.contains("pub(crate) fn i32_div_s(a: i32, b: i32) -> Result<i32, Trap>"));
        assert!(out.contains("pub(crate) fn i64_rem_u(a: i64, b: i64) -> Result<i64, Trap>"));
        assert!(out.contains("pub(crate) fn i32_trunc_f32_s(x: f32) -> Result<i32, Trap>"));
        assert!(out.contains("Ok(x as u64 as i64)"));
        assert!(out.contains("pub(crate) fn f64_max(a: f64, b: f64) -> f64"));
        assert!(out.contains("pub struct Context {"));
        assert!(out.contains("pub fn new() -> Result<Self, Trap> {"));
    }

    #[test]
    fn instantiation_order() {
        let module = ModuleBuilder::new()
            .function(unit(), vec![], vec![Instr::End])
            .global(Global::mutable(Value::I32(7)))
            .global(Global {
                ty: ValType::I32,
                mutable: false,
                init: InitExpr::Global(0),
            })
            .data(16, b"hi".to_vec())
            .table(4)
            .elements(1, vec![0, 0])
            .start(0)
            .build();
        let out = gen_context(&module, &EmitConfig::default()).expect("gen");

        let mem = out.find("mem: Memory::new()?").expect("memory");
        let data = out.find("ctx.mem.init_data(16, &DATA_0)?;").expect("data");
        let g0 = out.find("ctx.g0 = 7i32;").expect("g0");
        let g1 = out.find("ctx.g1 = ctx.g0;").expect("g1");
        let table = out.find("ctx.table[1..3]").expect("table");
        let start = out.find("ctx.f0()?;").expect("start");
        assert!(mem < data && data < g0 && g0 < g1 && g1 < table && table < start);

        assert!(out.contains("static DATA_0: [u8; 2] = [\n    0x68, 0x69,\n];"));
        assert!(out.contains("static ELEM_0: [u32; 2] = [0, 0];"));
        assert!(out.contains("table: vec![None; 4],"));
        assert!(out.contains("pub fn memory_mut(&mut self) -> &mut Memory"));
    }

    #[test]
    fn host_generic_with_imports() {
        let module = ModuleBuilder::new()
            .import("env", "seed", Signature::new([], [ValType::I64]))
            .global(Global {
                ty: ValType::I64,
                mutable: true,
                init: InitExpr::Import(0),
            })
            .build();
        let out = gen_context(&module, &EmitConfig::default()).expect("gen");
        assert!(out.contains("pub struct Context<H: Imports> {"));
        assert!(out.contains("impl<H: Imports> Context<H> {"));
        assert!(out.contains("pub fn new(host: H) -> Result<Self, Trap> {"));
        assert!(out.contains("ctx.g0 = ctx.i0()?;"));
        assert!(out.contains("pub fn host_mut(&mut self) -> &mut H"));
    }

    #[test]
    fn rejects_forward_global_reference() {
        let module = ModuleBuilder::new()
            .global(Global {
                ty: ValType::I32,
                mutable: false,
                init: InitExpr::Global(0),
            })
            .build();
        assert!(matches!(
            gen_context(&module, &EmitConfig::default()),
            Err(EmitError::GlobalForwardReference { global: 0, target: 0 })
        ));
    }

    #[test]
    fn rejects_initializer_type_mismatch() {
        let module = ModuleBuilder::new()
            .global(Global {
                ty: ValType::F32,
                mutable: false,
                init: InitExpr::Const(Value::I32(1)),
            })
            .build();
        assert!(matches!(
            gen_context(&module, &EmitConfig::default()),
            Err(EmitError::GlobalTypeMismatch { global: 0, .. })
        ));
    }

    #[test]
    fn rejects_bad_import_initializer() {
        let module = ModuleBuilder::new()
            .import("env", "f", Signature::new([ValType::I32], [ValType::I32]))
            .global(Global {
                ty: ValType::I32,
                mutable: false,
                init: InitExpr::Import(0),
            })
            .build();
        assert!(matches!(
            gen_context(&module, &EmitConfig::default()),
            Err(EmitError::GlobalImportSignature { global: 0, import: 0 })
        ));
    }

    #[test]
    fn rejects_oversized_data_segment() {
        let module = ModuleBuilder::new()
            .memory(1, None)
            .data(65535, vec![1, 2])
            .build();
        assert!(matches!(
            gen_context(&module, &EmitConfig::default()),
            Err(EmitError::DataOutOfBounds { segment: 0, end: 65537, size: 65536 })
        ));
    }

    #[test]
    fn rejects_bad_elements_and_start() {
        let module = ModuleBuilder::new().table(1).elements(0, vec![3]).build();
        assert!(matches!(
            gen_context(&module, &EmitConfig::default()),
            Err(EmitError::UnknownElementFunction { segment: 0, func: 3 })
        ));

        let module = ModuleBuilder::new()
            .function(unit(), vec![], vec![Instr::End])
            .table(1)
            .elements(0, vec![0, 0])
            .build();
        assert!(matches!(
            gen_context(&module, &EmitConfig::default()),
            Err(EmitError::ElementsOutOfBounds { segment: 0, end: 2, size: 1 })
        ));

        let module = ModuleBuilder::new()
            .function(Signature::new([ValType::I32], []), vec![], vec![Instr::End])
            .start(0)
            .build();
        assert!(matches!(
            gen_context(&module, &EmitConfig::default()),
            Err(EmitError::StartSignature(0))
        ));
    }
}
