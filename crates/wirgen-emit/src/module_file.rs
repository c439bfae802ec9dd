//! `mod.rs` tying the artifacts together.

use std::fmt::Write;

use wirgen_ir::Module;

use crate::config::EmitConfig;
use crate::header::file_header;

/// Generate `mod.rs`.
#[must_use]
pub fn gen_mod_file(module: &Module, cfg: &EmitConfig) -> String {
    let mut out = file_header(cfg, &format!("Translated module `{}`.", cfg.package));
    out.push('\n');

    out.push_str("pub mod context;\n");
    if module.has_memory() {
        out.push_str("pub mod mem;\n");
    }
    if module.has_imports() {
        out.push_str("pub mod imports;\n");
    }
    let has_exports = !module.exported_functions.is_empty();
    if has_exports {
        out.push_str("pub mod exports;\n");
    }
    out.push('\n');

    for i in 0..module.imported_functions.len() {
        let _ = writeln!(out, "mod i{i};");
    }
    for func in &module.functions {
        let _ = writeln!(out, "mod f{};", func.id);
    }
    if module.has_imports() || !module.functions.is_empty() {
        out.push('\n');
    }

    out.push_str("pub use context::{Context, Trap};\n");
    if module.has_memory() {
        out.push_str("pub use mem::Memory;\n");
    }
    if module.has_imports() {
        out.push_str("pub use imports::Imports;\n");
    }
    if has_exports {
        out.push_str("pub use exports::EXPORTS;\n");
    }
    out
}
