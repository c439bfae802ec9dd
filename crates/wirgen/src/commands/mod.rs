//! Command implementations.

mod generate;
mod inspect;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Gen { input, options } => generate::cmd_gen(input, options, cli.silent),
        Commands::Inspect { input } => inspect::cmd_inspect(input),
    }
}
