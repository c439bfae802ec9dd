//! `gen` command.

use std::path::Path;

use tracing::{error, info};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, GenArgs};
use crate::terminal::Spinner;

/// Handle the `gen` command.
pub fn cmd_gen(input: &Path, options: &GenArgs, silent: bool) -> i32 {
    let config = options.config();
    info!(
        input = %input.display(),
        output = %options.output_dir.display(),
        package = %config.package,
        "generating"
    );

    let spinner = Spinner::new(format!("Generating {}", input.display()), silent);
    match wirgen::generate(input, &options.output_dir, config) {
        Ok(paths) => {
            if !silent {
                spinner.finish_with_success(&format!(
                    "Wrote {} files to {}",
                    paths.len(),
                    options.output_dir.display()
                ));
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            if !silent {
                spinner.finish_with_failure("Generation failed");
            }
            error!(error = %e, "generation failed");
            EXIT_FAILURE
        }
    }
}
