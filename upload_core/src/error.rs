//! Library error types and handling

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UploadError>;

/// Fatal errors raised while configuring or running an upload pipeline.
///
/// Per-file validation failures are not represented here; they accumulate as
/// plain message strings on the coordinator and never abort processing of
/// the remaining files.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
