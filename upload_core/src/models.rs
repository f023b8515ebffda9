//! Data objects passed into and out of the upload pipeline

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use crate::error::UploadError;

/// Status code attached to every uploaded file by the upload machinery.
///
/// The numeric values follow the convention used by common web runtimes;
/// code 5 has never been assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Ok = 0,
    ServerSizeLimit = 1,
    FormSizeLimit = 2,
    Partial = 3,
    NoFile = 4,
    NoTmpDir = 6,
    CantWrite = 7,
    ExtensionBlocked = 8,
}

impl ErrorCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = UploadError;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(ErrorCode::Ok),
            1 => Ok(ErrorCode::ServerSizeLimit),
            2 => Ok(ErrorCode::FormSizeLimit),
            3 => Ok(ErrorCode::Partial),
            4 => Ok(ErrorCode::NoFile),
            6 => Ok(ErrorCode::NoTmpDir),
            7 => Ok(ErrorCode::CantWrite),
            8 => Ok(ErrorCode::ExtensionBlocked),
            other => Err(UploadError::Config(format!(
                "Unknown upload error code: {}",
                other
            ))),
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// One raw submission as reported by the transport layer, before
/// normalization into a [`File`](crate::file::File).
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub tmp_path: PathBuf,
    pub client_name: Option<String>,
    pub error: ErrorCode,
}

impl UploadedFile {
    pub fn new(
        tmp_path: impl Into<PathBuf>,
        client_name: Option<String>,
        error: ErrorCode,
    ) -> Self {
        Self {
            tmp_path: tmp_path.into(),
            client_name,
            error,
        }
    }

    /// Descriptor for a successfully received file.
    pub fn received(tmp_path: impl Into<PathBuf>, client_name: impl Into<String>) -> Self {
        Self::new(tmp_path, Some(client_name.into()), ErrorCode::Ok)
    }

    /// Descriptor for a form field that was submitted without a file.
    pub fn missing() -> Self {
        Self::new(PathBuf::new(), None, ErrorCode::NoFile)
    }
}

/// Files submitted under one form field: a lone descriptor, or an ordered
/// list when the field uses array notation.
#[derive(Debug, Clone)]
pub enum FieldFiles {
    Single(UploadedFile),
    Multiple(Vec<UploadedFile>),
}

/// Map of form field name to submitted files. This is the explicit input
/// of the pipeline; nested field shapes are unrepresentable here and are
/// therefore dropped at the transport boundary.
#[derive(Debug, Clone, Default)]
pub struct UploadedFiles {
    fields: HashMap<String, FieldFiles>,
}

impl UploadedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_single(&mut self, field: impl Into<String>, file: UploadedFile) {
        self.fields.insert(field.into(), FieldFiles::Single(file));
    }

    pub fn insert_many(&mut self, field: impl Into<String>, files: Vec<UploadedFile>) {
        self.fields.insert(field.into(), FieldFiles::Multiple(files));
    }

    /// Appends a descriptor to a field, upgrading it to a list on the
    /// second append.
    pub fn push(&mut self, field: impl Into<String>, file: UploadedFile) {
        use std::collections::hash_map::Entry;

        match self.fields.entry(field.into()) {
            Entry::Vacant(entry) => {
                entry.insert(FieldFiles::Single(file));
            }
            Entry::Occupied(mut entry) => match entry.get_mut() {
                FieldFiles::Single(first) => {
                    let first = first.clone();
                    entry.insert(FieldFiles::Multiple(vec![first, file]));
                }
                FieldFiles::Multiple(list) => list.push(file),
            },
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldFiles> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Metadata snapshot of one successfully stored file.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub path: PathBuf,
    pub full_name: String,
    pub name: String,
    pub extension: String,
    pub mime_type: String,
    pub error: ErrorCode,
    pub size: u64,
    pub checksum: String,
    pub original_name: Option<String>,
}

impl UploadResult {
    /// Builds a result from the destination path; name, extension and full
    /// name derive from the path's final component.
    pub fn new(
        path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
        error: ErrorCode,
        size: u64,
        checksum: impl Into<String>,
        original_name: Option<String>,
    ) -> Self {
        let path = path.into();
        let full_name = component_str(path.file_name());
        let name = component_str(path.file_stem());
        let extension = component_str(path.extension());

        Self {
            path,
            full_name,
            name,
            extension,
            mime_type: mime_type.into(),
            error,
            size,
            checksum: checksum.into(),
            original_name,
        }
    }
}

fn component_str(component: Option<&std::ffi::OsStr>) -> String {
    component
        .map(|c| c.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Outcome of a processed upload: untouched, one stored file, or an
/// ordered sequence of stored files.
#[derive(Debug, Clone)]
pub enum UploadInfo {
    NotProcessed,
    Single(UploadResult),
    Multiple(Vec<UploadResult>),
}

impl UploadInfo {
    pub fn is_processed(&self) -> bool {
        !matches!(self, UploadInfo::NotProcessed)
    }

    /// All stored results in upload order, regardless of arity.
    pub fn results(&self) -> &[UploadResult] {
        match self {
            UploadInfo::NotProcessed => &[],
            UploadInfo::Single(result) => std::slice::from_ref(result),
            UploadInfo::Multiple(results) => results,
        }
    }
}
