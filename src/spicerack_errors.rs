use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpiceRackError>;

#[derive(Error, Debug)]
pub enum SpiceRackError {
    #[error("Malformed rule pattern: {0}")]
    Construction(String),

    #[error("Unrecognized kernel file extension: {0}")]
    UnknownExtension(String),

    #[error("Kernel file not found: {0}")]
    NotFound(String),

    #[error("Invalid kernel composition: {0}")]
    InvalidState(String),

    #[error("Unable to determine time coverage: {0}")]
    Coverage(String),

    #[error("Invalid version identifier: {0}")]
    InvalidVersion(String),

    #[error("Invalid date or time: {0}")]
    TimeFormat(String),

    #[error("Unknown property in filter: {0}")]
    UnknownProperty(String),

    #[error("Content inspection not supported for: {0}")]
    Unsupported(String),

    #[error("Download of kernel file failed: {0}")]
    Fetch(String),

    #[error("Regex compilation error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),
}
