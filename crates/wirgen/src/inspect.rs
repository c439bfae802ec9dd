//! Human-readable module listing.

use std::fmt::Write;

use wirgen_ir::{InitExpr, Instr, Module};

/// Module summary followed by the text form of every function body,
/// indented by nesting depth.
#[must_use]
pub fn describe(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "types: {}", module.types.len());
    for (i, sig) in module.types.iter().enumerate() {
        let _ = writeln!(out, "  {i}: {sig}");
    }

    let _ = writeln!(out, "imports: {}", module.imported_functions.len());
    for (i, import) in module.imported_functions.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {i}: {}.{} {}",
            import.module, import.field, import.signature
        );
    }

    let _ = writeln!(out, "exports: {}", module.exported_functions.len());
    for export in &module.exported_functions {
        let _ = writeln!(out, "  {:?} -> func {}", export.name, export.func);
    }

    let _ = writeln!(out, "globals: {}", module.globals.len());
    for (i, global) in module.globals.iter().enumerate() {
        let mutability = if global.mutable { "mut " } else { "" };
        let init = match global.init {
            InitExpr::Const(value) => value.to_string(),
            InitExpr::Global(g) => format!("global {g}"),
            InitExpr::Import(f) => format!("import {f}"),
        };
        let _ = writeln!(out, "  {i}: {mutability}{} = {init}", global.ty);
    }

    match &module.memory {
        Some(memory) => {
            let max = memory
                .maximum
                .map_or_else(|| "none".to_string(), |m| m.to_string());
            let _ = writeln!(out, "memory: {} pages (max {max})", memory.initial);
            for (i, segment) in memory.data.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  data {i}: {} bytes at {}",
                    segment.bytes.len(),
                    segment.offset
                );
            }
        }
        None => out.push_str("memory: none\n"),
    }

    match &module.table {
        Some(table) => {
            let _ = writeln!(out, "table: {} slots", table.initial);
            for (i, segment) in table.elements.iter().enumerate() {
                let _ = writeln!(out, "  elem {i}: {:?} at {}", segment.funcs, segment.offset);
            }
        }
        None => out.push_str("table: none\n"),
    }

    if let Some(start) = module.start {
        let _ = writeln!(out, "start: func {start}");
    }

    let _ = writeln!(
        out,
        "functions: {} ({} instructions)",
        module.functions.len(),
        module.instruction_count()
    );
    for func in &module.functions {
        let _ = writeln!(out, "\nfunc {} {}", func.id, func.signature);
        if !func.locals.is_empty() {
            let locals: Vec<String> = func.locals.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "  locals: {}", locals.join(", "));
        }
        let mut depth = 1usize;
        for (offset, instr) in func.body.iter().enumerate() {
            if matches!(instr, Instr::End | Instr::Else) {
                depth = depth.saturating_sub(1);
            }
            let _ = writeln!(out, "  {offset:>4}: {:indent$}{instr}", "", indent = depth * 2);
            if instr.opens_frame() || matches!(instr, Instr::Else) {
                depth += 1;
            }
        }
    }
    out
}
