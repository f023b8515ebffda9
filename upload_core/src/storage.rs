//! Storage strategies for validated files

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, UploadError};
use crate::file::File;
use crate::models::UploadResult;

/// Destination for validated files. Implementations are shared across the
/// coordinators of concurrent requests, so they take `&self` and must be
/// thread-safe.
pub trait StorageBackend: Send + Sync {
    fn upload(&self, file: &File) -> Result<UploadResult>;
}

/// Stores files by copying them into a target directory.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    directory: PathBuf,
    overwrite: bool,
}

impl FileSystemStorage {
    /// Validates the target directory up front and stores its canonical
    /// absolute path. A missing or unwritable target fails with a
    /// configuration error.
    pub fn new(directory: impl AsRef<Path>, overwrite: bool) -> Result<Self> {
        let directory = directory.as_ref();
        let directory = fs::canonicalize(directory).map_err(|_| {
            UploadError::Config(format!(
                "Upload directory {} does not exist",
                directory.display()
            ))
        })?;

        if !directory.is_dir() {
            return Err(UploadError::Config(format!(
                "Upload path {} is not a directory",
                directory.display()
            )));
        }

        tempfile::tempfile_in(&directory).map_err(|_| {
            UploadError::Config(format!(
                "Upload directory {} is not writable",
                directory.display()
            ))
        })?;

        Ok(Self {
            directory,
            overwrite,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl StorageBackend for FileSystemStorage {
    fn upload(&self, file: &File) -> Result<UploadResult> {
        let destination = self.directory.join(file.full_name());

        if !self.overwrite && destination.exists() {
            return Err(UploadError::AlreadyExists(destination));
        }

        if let Err(source) = fs::copy(file.path(), &destination) {
            tracing::warn!(
                "Failed to move {} to {}: {}",
                file.path().display(),
                destination.display(),
                source
            );
            return Err(UploadError::MoveFailed {
                from: file.path().to_path_buf(),
                to: destination,
                source,
            });
        }

        let result = UploadResult::new(
            destination,
            file.mime_type(),
            file.error_code(),
            file.size(),
            file.md5(),
            file.client_name().map(String::from),
        );

        tracing::debug!(
            "Stored {} ({} bytes) at {}",
            result.full_name,
            result.size,
            result.path.display()
        );

        Ok(result)
    }
}
