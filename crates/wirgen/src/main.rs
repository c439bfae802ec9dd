//! wirgen CLI - WebAssembly IR to Rust source generator

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the command-line level.
    let default_level = if cli.verbose {
        "wirgen=debug"
    } else if cli.silent {
        "wirgen=error"
    } else {
        "wirgen=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = commands::run_command(&cli);
    std::process::exit(exit_code);
}
