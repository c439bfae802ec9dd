//! `Imports` trait and per-import forwarding stubs.

use std::fmt::Write;

use tracing::debug;
use wirgen_ir::{ImportedFunction, Module};

use crate::config::EmitConfig;
use crate::error::{EmitError, Result};
use crate::function::result_type;
use crate::header::{GENERATED_ALLOWS, context_impl, context_uses, file_header};
use crate::ident::{NameSet, snake_case};

/// Host method name for every import, in import order.
#[must_use]
pub fn import_method_names(module: &Module) -> Vec<String> {
    let mut names = NameSet::new();
    module
        .imported_functions
        .iter()
        .map(|import| {
            let base = snake_case(&format!("{}_{}", import.module, import.field));
            names.claim(&base, |_| false)
        })
        .collect()
}

fn check_single_result(index: usize, import: &ImportedFunction) -> Result<()> {
    if import.signature.results.len() > 1 {
        return Err(EmitError::MultiValue {
            item: format!("import {index} ({}.{})", import.module, import.field),
        });
    }
    Ok(())
}

/// Host method parameter list, without the receiver.
fn host_params(module: &Module, import: &ImportedFunction) -> String {
    let mut params = Vec::with_capacity(import.signature.params.len() + 1);
    if module.has_memory() {
        params.push("mem: &mut Memory".to_string());
    }
    for (i, ty) in import.signature.params.iter().enumerate() {
        params.push(format!("p{i}: {ty}"));
    }
    params.join(", ")
}

/// Generate `imports.rs`. Returns `None` when the module imports nothing.
///
/// # Errors
///
/// Returns an error if an import has more than one result.
pub fn gen_imports(module: &Module, cfg: &EmitConfig) -> Result<Option<String>> {
    if !module.has_imports() {
        return Ok(None);
    }
    debug!(imports = module.imported_functions.len(), "generating imports");

    let mut out = file_header(cfg, "Host functions the module imports.");
    out.push('\n');
    out.push_str("#![allow(dead_code, unused_imports, clippy::all)]\n\n");
    out.push_str("use super::context::Trap;\n");
    if module.has_memory() {
        out.push_str("use super::mem::Memory;\n");
    }
    out.push('\n');

    out.push_str("/// Implemented by the embedder to satisfy the module's imports.\n");
    out.push_str("pub trait Imports {\n");
    let names = import_method_names(module);
    for (i, (import, name)) in module.imported_functions.iter().zip(&names).enumerate() {
        check_single_result(i, import)?;
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "    /// `{}.{}`",
            import.module.escape_default(),
            import.field.escape_default()
        );
        let params = host_params(module, import);
        let separator = if params.is_empty() { "" } else { ", " };
        let _ = writeln!(
            out,
            "    fn {name}(&mut self{separator}{params}) -> {};",
            result_type(&import.signature)
        );
    }
    out.push_str("}\n");
    Ok(Some(out))
}

/// Generate `i<index>.rs`, forwarding `Context::i<index>` to the host.
///
/// # Errors
///
/// Returns an error if the import does not exist or has more than one result.
pub fn gen_import_stub(module: &Module, cfg: &EmitConfig, index: u32) -> Result<String> {
    let import = module
        .import(index)
        .ok_or(EmitError::UnknownImport(index))?;
    check_single_result(index as usize, import)?;
    let names = import_method_names(module);
    let name = &names[index as usize];

    let mut out = file_header(
        cfg,
        &format!(
            "Import {index}: `{}.{}`.",
            import.module.escape_default(),
            import.field.escape_default()
        ),
    );
    out.push('\n');
    out.push_str(GENERATED_ALLOWS);
    out.push('\n');
    out.push_str(&context_uses(module));
    out.push('\n');
    let _ = writeln!(out, "{}", context_impl(module));

    let mut params = String::from("&mut self");
    let mut args = Vec::with_capacity(import.signature.params.len() + 1);
    if module.has_memory() {
        args.push("&mut self.mem".to_string());
    }
    for (i, ty) in import.signature.params.iter().enumerate() {
        let _ = write!(params, ", p{i}: {ty}");
        args.push(format!("p{i}"));
    }
    let _ = writeln!(
        out,
        "    pub(crate) fn i{index}({params}) -> {} {{",
        result_type(&import.signature)
    );
    let _ = writeln!(out, "        self.host.{name}({})", args.join(", "));
    out.push_str("    }\n}\n");
    Ok(out)
}
