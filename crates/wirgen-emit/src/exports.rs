//! Export table and named wrappers.

use std::fmt::Write;

use tracing::debug;
use wirgen_ir::Module;

use crate::config::{EmitConfig, ExportNaming};
use crate::error::{EmitError, Result};
use crate::function::result_type;
use crate::header::{GENERATED_ALLOWS, context_impl, context_uses, file_header};
use crate::ident::{NameSet, camel_case, is_generated_name, sanitize};

/// Methods `Context` already defines.
const RESERVED: &[&str] = &["new", "memory", "memory_mut", "host", "host_mut"];

fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name) || is_generated_name(name)
}

/// Wrapper method name for every export, in export order.
#[must_use]
pub fn export_method_names(module: &Module, cfg: &EmitConfig) -> Vec<String> {
    let mut names = NameSet::new();
    module
        .exported_functions
        .iter()
        .map(|export| {
            let base = match cfg.export_naming {
                ExportNaming::Preserve => sanitize(&export.name),
                ExportNaming::CamelCase => camel_case(&export.name),
            };
            names.claim(&base, is_reserved)
        })
        .collect()
}

/// Generate `exports.rs`. Returns `None` when the module exports nothing.
///
/// # Errors
///
/// Returns an error if an export names a function that does not exist.
pub fn gen_exports(module: &Module, cfg: &EmitConfig) -> Result<Option<String>> {
    if module.exported_functions.is_empty() {
        return Ok(None);
    }
    debug!(
        exports = module.exported_functions.len(),
        naming = ?cfg.export_naming,
        "generating exports"
    );

    let mut out = file_header(cfg, "Exported functions.");
    out.push('\n');
    out.push_str(GENERATED_ALLOWS);
    out.push('\n');
    out.push_str(&context_uses(module));
    out.push('\n');

    out.push_str("/// Export names and the functions they refer to.\n");
    out.push_str("pub const EXPORTS: &[(&str, u32)] = &[\n");
    for export in &module.exported_functions {
        let _ = writeln!(out, "    ({:?}, {}),", export.name, export.func);
    }
    out.push_str("];\n\n");

    let _ = writeln!(out, "{}", context_impl(module));
    let visibility = cfg.export_visibility.keyword();
    let names = export_method_names(module, cfg);
    for (i, (export, name)) in module.exported_functions.iter().zip(&names).enumerate() {
        let func = module
            .function(export.func)
            .ok_or_else(|| EmitError::UnknownExportTarget {
                name: export.name.clone(),
                func: export.func,
            })?;
        let sig = &func.signature;
        if sig.results.len() > 1 {
            return Err(EmitError::MultiValue {
                item: format!("export `{}`", export.name),
            });
        }

        let mut params = String::from("&mut self");
        let mut args = Vec::with_capacity(sig.params.len());
        for (p, ty) in sig.params.iter().enumerate() {
            let _ = write!(params, ", p{p}: {ty}");
            args.push(format!("p{p}"));
        }
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "    /// Export `{}`.", export.name.escape_default());
        let _ = writeln!(
            out,
            "    {visibility} fn {name}({params}) -> {} {{",
            result_type(sig)
        );
        let _ = writeln!(out, "        self.f{}({})", export.func, args.join(", "));
        out.push_str("    }\n");
    }
    out.push_str("}\n");
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Visibility;
    use wirgen_ir::{Instr, ModuleBuilder, Signature, ValType};

    fn module() -> Module {
        ModuleBuilder::new()
            .function(
                Signature::new([ValType::I32, ValType::I32], [ValType::I32]),
                Vec::new(),
                vec![Instr::LocalGet(0), Instr::End],
            )
            .function(Signature::default(), Vec::new(), vec![Instr::End])
            .export("add-two", 0)
            .export("sum", 0)
            .export("new", 1)
            .export("f0", 1)
            .export("run", 1)
            .export("run", 1)
            .build()
    }

    #[test]
    fn names_avoid_generated_items() {
        let names = export_method_names(&module(), &EmitConfig::default());
        assert_eq!(names, ["add_two", "sum", "new_", "f0_", "run", "run_"]);

        let cfg = EmitConfig::default().with_export_naming(ExportNaming::CamelCase);
        assert_eq!(export_method_names(&module(), &cfg)[0], "addTwo");
    }

    #[test]
    fn table_and_wrappers() {
        let out = gen_exports(&module(), &EmitConfig::default()).unwrap().unwrap();
        assert!(out.contains("pub const EXPORTS: &[(&str, u32)] = &[\n    (\"add-two\", 0),\n    (\"sum\", 0),"));
        assert!(out.contains(
            "    pub fn add_two(&mut self, p0: i32, p1: i32) -> Result<i32, Trap> {\n        self.f0(p0, p1)\n    }\n"
        ));
        assert!(out.contains("    pub fn sum(&mut self, p0: i32, p1: i32) -> Result<i32, Trap> {"));
        assert!(out.contains("    pub fn new_(&mut self) -> Result<(), Trap> {\n        self.f1()\n"));
    }

    #[test]
    fn crate_visibility() {
        let cfg = EmitConfig::default().with_export_visibility(Visibility::Crate);
        let out = gen_exports(&module(), &cfg).unwrap().unwrap();
        assert!(out.contains("    pub(crate) fn run(&mut self) -> Result<(), Trap> {"));
        assert!(!out.contains("    pub fn "));
    }

    #[test]
    fn unknown_target_rejected() {
        let module = ModuleBuilder::new().export("main", 4).build();
        let err = gen_exports(&module, &EmitConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            EmitError::UnknownExportTarget { ref name, func: 4 } if name == "main"
        ));
    }

    #[test]
    fn no_exports_no_artifact() {
        let module = ModuleBuilder::new().build();
        assert!(gen_exports(&module, &EmitConfig::default()).unwrap().is_none());
    }

    #[test]
    fn empty_and_symbol_names_become_identifiers() {
        let module = ModuleBuilder::new()
            .function(Signature::new([], [ValType::I32]), Vec::new(), vec![Instr::End])
            .export("", 0)
            .export("-", 0)
            .build();
        assert_eq!(export_method_names(&module, &EmitConfig::default()), ["_x", "_x_"]);

        let out = gen_exports(&module, &EmitConfig::default()).unwrap().unwrap();
        assert!(out.contains("    (\"\", 0),\n    (\"-\", 0),\n"));
        assert!(out.contains("    pub fn _x(&mut self) -> Result<i32, Trap> {"));
        assert!(out.contains("    pub fn _x_(&mut self) -> Result<i32, Trap> {"));
        assert!(!out.contains("fn _("));

        let cfg = EmitConfig::default().with_export_naming(ExportNaming::CamelCase);
        assert_eq!(export_method_names(&module, &cfg), ["_x", "_x_"]);
    }
}
