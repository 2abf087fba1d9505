//! File error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("WAV error: {0}")]
    Wav(String),

    #[error("Resample error: {0}")]
    Resample(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type FileResult<T> = Result<T, FileError>;

impl From<hound::Error> for FileError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => FileError::Io(e),
            hound::Error::Unsupported => {
                FileError::UnsupportedFormat("WAV encoding not supported".into())
            }
            other => FileError::Wav(other.to_string()),
        }
    }
}

impl From<pf_core::PfError> for FileError {
    fn from(err: pf_core::PfError) -> Self {
        FileError::Model(err.to_string())
    }
}
