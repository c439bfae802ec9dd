//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use wirgen::{EmitConfig, ExportNaming, MemoryBackend, Visibility};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "wirgen")]
#[command(about = "WebAssembly IR to Rust source generator")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (sets the log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate Rust source from an IR module
    Gen {
        /// Input IR module
        #[arg(value_name = "FILE.ir")]
        input: PathBuf,

        #[command(flatten)]
        options: GenArgs,
    },
    /// Print a module summary and the text form of every function
    Inspect {
        /// Input IR module
        #[arg(value_name = "FILE.ir")]
        input: PathBuf,
    },
}

/// Code generation options.
#[derive(clap::Args, Clone, Debug)]
pub struct GenArgs {
    /// Output directory
    #[arg(short = 'd', long, default_value = "gen")]
    pub output_dir: PathBuf,

    /// Package (module) name used in generated headers
    #[arg(short, long = "pkg", default_value = "gen")]
    pub pkg: String,

    /// Annotate generated code with the instruction it came from
    #[arg(short = 'C', long)]
    pub expr_comments: bool,

    /// Convert export names to camelCase
    #[arg(short = 'c', long)]
    pub camel_case_exports: bool,

    /// Make export wrappers `pub` (otherwise `pub(crate)`)
    #[arg(short = 'e', long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub export_exports: bool,

    /// Back linear memory with a reserved mmap region
    #[arg(short, long)]
    pub mmap: bool,

    /// Use unchecked memory accesses and indirect calls
    #[arg(short, long)]
    pub use_unsafe: bool,
}

impl GenArgs {
    /// Emit configuration for these options.
    pub fn config(&self) -> EmitConfig {
        EmitConfig::new()
            .with_package(self.pkg.clone())
            .with_expr_comments(self.expr_comments)
            .with_export_naming(if self.camel_case_exports {
                ExportNaming::CamelCase
            } else {
                ExportNaming::Preserve
            })
            .with_export_visibility(if self.export_exports {
                Visibility::Public
            } else {
                Visibility::Crate
            })
            .with_memory_backend(if self.mmap {
                MemoryBackend::Mapped
            } else {
                MemoryBackend::Buffer
            })
            .with_unsafe_access(self.use_unsafe)
    }
}
