//! wirgen - WebAssembly IR to Rust source generator
//!
//! Reads a serialized IR module and writes Rust source implementing it: one
//! file per function and import, plus context, memory, imports, exports and
//! a `mod.rs` tying them together.
//!
//! # Example
//!
//! ```ignore
//! use wirgen::{EmitConfig, generate};
//!
//! let paths = generate("module.ir", "gen/", EmitConfig::default())?;
//! ```

pub use wirgen_emit::{
    Artifact, EmitConfig, EmitError, ExportNaming, FunctionError, FunctionErrorKind,
    MemoryBackend, Project, Visibility, generate_artifacts,
};
pub use wirgen_ir::{DecodeError, Module, ModuleBuilder, decode, encode};

mod error;
mod inspect;

pub use error::{Error, Result};
pub use inspect::describe;

use std::path::{Path, PathBuf};

use tracing::debug;

/// Read and decode an IR module file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid module.
pub fn load_module(path: impl AsRef<Path>) -> Result<Module> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let module = decode(&bytes).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        bytes = bytes.len(),
        functions = module.functions.len(),
        "module loaded"
    );
    Ok(module)
}

/// Generate Rust source for the module in `input` into `output`.
///
/// Returns the written paths.
///
/// # Errors
///
/// Returns an error if the module cannot be loaded, is invalid, or the
/// output cannot be written.
pub fn generate(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: EmitConfig,
) -> Result<Vec<PathBuf>> {
    let module = load_module(input)?;
    let paths = Project::new(output, config).write(&module)?;
    Ok(paths)
}
