//! `inspect` command.

use std::path::Path;

use tracing::error;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// Handle the `inspect` command.
pub fn cmd_inspect(input: &Path) -> i32 {
    match wirgen::load_module(input) {
        Ok(module) => {
            print!("{}", wirgen::describe(&module));
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "inspect failed");
            EXIT_FAILURE
        }
    }
}
