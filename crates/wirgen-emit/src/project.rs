//! Project - artifact generation orchestration.
//!
//! Coordinates emission of all artifacts:
//! - Context (instance state, traps, helpers)
//! - Memory (if the module declares one)
//! - Imports trait and one stub per import
//! - Exports table and wrappers
//! - One file per function, generated in parallel
//! - `mod.rs`

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info, trace};
use wirgen_ir::Module;

use crate::config::EmitConfig;
use crate::context::gen_context;
use crate::error::{EmitError, FunctionError, Result};
use crate::exports::gen_exports;
use crate::function::gen_function;
use crate::ident::is_module_name;
use crate::imports::{gen_import_stub, gen_imports};
use crate::memory::gen_memory;
use crate::module_file::gen_mod_file;

/// One generated source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// File name inside the output directory.
    pub name: String,
    pub contents: String,
}

impl Artifact {
    fn new(name: impl Into<String>, contents: String) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }
}

/// Module-wide checks that precede any generation.
fn validate(module: &Module, cfg: &EmitConfig) -> Result<()> {
    if !is_module_name(&cfg.package) {
        return Err(EmitError::InvalidPackage(cfg.package.clone()));
    }
    let mut ids = FxHashSet::default();
    for func in &module.functions {
        if !ids.insert(func.id) {
            return Err(EmitError::DuplicateFunction(func.id));
        }
    }
    for (i, sig) in module.types.iter().enumerate() {
        if sig.results.len() > 1 {
            return Err(EmitError::MultiValue {
                item: format!("type {i}"),
            });
        }
    }
    Ok(())
}

/// Generate every artifact in driver order: context, memory, imports,
/// import stubs, exports, functions (by position), `mod.rs`.
///
/// # Errors
///
/// Returns the first structural or per-function error. Nothing is produced
/// for an invalid module.
pub fn generate_artifacts(module: &Module, cfg: &EmitConfig) -> Result<Vec<Artifact>> {
    validate(module, cfg)?;
    debug!(
        functions = module.functions.len(),
        imports = module.imported_functions.len(),
        exports = module.exported_functions.len(),
        instructions = module.instruction_count(),
        "generating artifacts"
    );

    let mut artifacts = Vec::with_capacity(module.functions.len() + module.imported_functions.len() + 5);
    artifacts.push(Artifact::new("context.rs", gen_context(module, cfg)?));
    if let Some(mem) = gen_memory(module, cfg)? {
        artifacts.push(Artifact::new("mem.rs", mem));
    }
    if let Some(imports) = gen_imports(module, cfg)? {
        artifacts.push(Artifact::new("imports.rs", imports));
        for index in 0..module.imported_functions.len() {
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            artifacts.push(Artifact::new(
                format!("i{index}.rs"),
                gen_import_stub(module, cfg, index)?,
            ));
        }
    }
    if let Some(exports) = gen_exports(module, cfg)? {
        artifacts.push(Artifact::new("exports.rs", exports));
    }

    // Collecting into Result keeps function order and reports the first error.
    let functions: Vec<Artifact> = module
        .functions
        .par_iter()
        .map(|func| {
            gen_function(module, cfg, func).map(|contents| {
                trace!(func = func.id, bytes = contents.len(), "function generated");
                Artifact::new(format!("f{}.rs", func.id), contents)
            })
        })
        .collect::<std::result::Result<_, FunctionError>>()?;
    artifacts.extend(functions);

    artifacts.push(Artifact::new("mod.rs", gen_mod_file(module, cfg)));
    Ok(artifacts)
}

/// Generation project bound to an output directory.
pub struct Project {
    /// Output directory.
    pub output_dir: PathBuf,
    /// Emit configuration.
    pub config: EmitConfig,
}

impl Project {
    /// Create a new Project.
    pub fn new(output_dir: impl AsRef<Path>, config: EmitConfig) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            config,
        }
    }

    /// Path of an artifact inside the output directory.
    #[must_use]
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Path to `mod.rs`.
    #[must_use]
    pub fn mod_path(&self) -> PathBuf {
        self.artifact_path("mod.rs")
    }

    /// Generate every artifact and write it, creating the output directory
    /// if needed and overwriting existing files.
    ///
    /// Returns the written paths in generation order.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails (nothing is written then) or a
    /// file cannot be written.
    pub fn write(&self, module: &Module) -> Result<Vec<PathBuf>> {
        let artifacts = generate_artifacts(module, &self.config)?;

        fs::create_dir_all(&self.output_dir).map_err(|source| EmitError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        debug!(
            output_dir = %self.output_dir.display(),
            package = %self.config.package,
            artifacts = artifacts.len(),
            "writing project"
        );

        let mut paths = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            let path = self.artifact_path(&artifact.name);
            trace!(path = %path.display(), bytes = artifact.contents.len(), "writing artifact");
            fs::write(&path, &artifact.contents).map_err(|source| EmitError::Io {
                path: path.clone(),
                source,
            })?;
            paths.push(path);
        }

        info!(
            output_dir = %self.output_dir.display(),
            files = paths.len(),
            "project generated"
        );
        Ok(paths)
    }
}
