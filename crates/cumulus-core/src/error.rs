//! Error types for cumulus-core

use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no full backup exists at {location:?}: differential mode requires a prior full backup")]
    NoBaseAvailable { location: PathBuf },

    #[error("ambiguous chain state at {location:?}: {detail}")]
    AmbiguousChainState { location: PathBuf, detail: String },

    #[error("{stage} failed: `{command}` exited with status {code:?}")]
    ExternalToolFailure {
        stage: Stage,
        command: String,
        code: Option<i32>,
    },

    #[error("cannot compute a safe deletion set: {0}")]
    RetentionCompute(String),

    #[error("destination is locked by another run: {path:?}")]
    LockHeld { path: PathBuf },

    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
