//! Flexible file upload handling with pluggable validation and storage
//! strategies.
//!
//! The pipeline is synchronous and filesystem-bound: raw submissions are
//! normalized into [`File`] entities and run through an ordered chain of
//! [`ValidationRule`]s before a [`StorageBackend`] persists them. Async
//! embedders run the whole pipeline inside a blocking task.

pub mod coordinator;
pub mod error;
pub mod file;
pub mod models;
pub mod storage;
pub mod util;
pub mod validation;

pub use coordinator::{UploadCoordinator, UploadOptions};
pub use error::{Result, UploadError};
pub use file::{DefaultFileFactory, File, FileFactory};
pub use models::{ErrorCode, FieldFiles, UploadInfo, UploadResult, UploadedFile, UploadedFiles};
pub use storage::{FileSystemStorage, StorageBackend};
pub use validation::{
    Extension, MimeType, Required, Size, UploadErrorOk, ValidationRule, Validator,
};
