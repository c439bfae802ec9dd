use std::path::PathBuf;

use thiserror::Error;

/// Generator errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: wirgen_ir::DecodeError,
    },
    #[error(transparent)]
    Emit(#[from] wirgen_emit::EmitError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
