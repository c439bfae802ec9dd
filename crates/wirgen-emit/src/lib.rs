//! Rust source generation from WebAssembly module IR.
//!
//! Each generator is a pure function of the module and an [`EmitConfig`].
//! [`Project`] runs them in order and writes one file per artifact.

mod config;
mod context;
mod error;
mod exports;
mod expr;
mod function;
mod header;
pub mod ident;
mod imports;
mod memory;
mod module_file;
mod project;

pub use config::*;
pub use context::gen_context;
pub use error::*;
pub use exports::{export_method_names, gen_exports};
pub use function::{FunctionEmitter, gen_function};
pub use imports::{gen_import_stub, gen_imports, import_method_names};
pub use memory::{PAGE_LIMIT, PAGE_SIZE, gen_memory, max_pages};
pub use module_file::gen_mod_file;
pub use project::{Artifact, Project, generate_artifacts};
