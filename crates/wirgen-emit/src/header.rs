//! Shared artifact prologue helpers.

use std::fmt::Write;

use wirgen_ir::Module;

use crate::config::EmitConfig;

/// Module-level doc header naming the package and the artifact's role.
pub(crate) fn file_header(cfg: &EmitConfig, role: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "//! {role}");
    let _ = writeln!(out, "//!");
    let _ = writeln!(
        out,
        "//! Generated by wirgen for package `{}`. Do not edit.",
        cfg.package
    );
    out
}

/// Inner attributes silencing lints the generated code trips by construction.
pub(crate) const GENERATED_ALLOWS: &str = "#![allow(\n    dead_code,\n    unused_imports,\n    unused_labels,\n    unused_mut,\n    unused_variables,\n    unused_assignments,\n    unused_parens,\n    unused_unsafe,\n    unreachable_code,\n    unreachable_patterns,\n    non_snake_case,\n    clippy::all\n)]\n";

/// `impl` line opening a block of `Context` methods.
pub(crate) fn context_impl(module: &Module) -> &'static str {
    if module.has_imports() {
        "impl<H: Imports> Context<H> {"
    } else {
        "impl Context {"
    }
}

/// `use` lines every method-carrying artifact needs.
pub(crate) fn context_uses(module: &Module) -> String {
    let mut out = String::from("use super::context::*;\n");
    if module.has_imports() {
        out.push_str("use super::imports::Imports;\n");
    }
    if module.has_memory() {
        out.push_str("use super::mem::Memory;\n");
    }
    out
}

/// Hex byte table rows, sixteen bytes per line.
pub(crate) fn byte_rows(bytes: &[u8], indent: &str) -> String {
    let mut out = String::new();
    for chunk in bytes.chunks(16) {
        out.push_str(indent);
        for (i, b) in chunk.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "0x{b:02x},");
        }
        out.push('\n');
    }
    out
}
