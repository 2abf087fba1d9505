//! Engine error types
//!
//! Only the control-side loaders can fail. Effects and the runtime never
//! return errors from the audio path.

use pf_file::FileError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Resource queue full ({0} pending)")]
    QueueFull(usize),

    #[error("Resource rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    File(#[from] FileError),
}

pub type EngineResult<T> = Result<T, EngineError>;
