//! Uploaded file entity and its construction

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use md5::{Digest, Md5};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::Result;
use crate::models::ErrorCode;

lazy_static! {
    static ref NAME_SANITIZER: Regex = Regex::new(r"[^A-Za-z0-9.]+").unwrap();
}

const MIME_PROBE_LEN: u64 = 8192;

/// A single uploaded file sitting in its temporary location, with the
/// display name it will be stored under.
///
/// The display name is always filesystem-safe: every run of characters
/// outside `[A-Za-z0-9.]` collapses to a single underscore and directory
/// components are stripped.
#[derive(Debug, Clone)]
pub struct File {
    tmp_path: PathBuf,
    name: String,
    extension: String,
    mime_type: OnceCell<String>,
    error: ErrorCode,
    client_name: Option<String>,
}

impl File {
    /// Creates a file entity for the given temporary path. The display
    /// name and extension derive from `desired_name`, falling back to the
    /// path's final component when no name was supplied.
    pub fn new(tmp_path: impl Into<PathBuf>, desired_name: Option<&str>, error: ErrorCode) -> Self {
        let tmp_path = tmp_path.into();
        let desired = match desired_name {
            Some(name) => name.to_string(),
            None => tmp_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let desired_path = Path::new(&desired);
        let stem = desired_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = desired_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut file = Self {
            tmp_path,
            name: String::new(),
            extension: String::new(),
            mime_type: OnceCell::new(),
            error,
            client_name: desired_name.map(String::from),
        };
        file.set_name(&stem);
        file.set_extension(&extension);
        file
    }

    /// Replaces the display name, sanitizing it first.
    pub fn set_name(&mut self, name: &str) -> &mut Self {
        let cleaned = NAME_SANITIZER.replace_all(name, "_");
        self.name = Path::new(cleaned.as_ref())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self
    }

    /// Replaces the extension, lowercased.
    pub fn set_extension(&mut self, extension: &str) -> &mut Self {
        self.extension = extension.to_lowercase();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Display name and extension joined with a dot; the name alone when
    /// there is no extension.
    pub fn full_name(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }

    pub fn path(&self) -> &Path {
        &self.tmp_path
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error
    }

    /// The name the client declared for this file, if any.
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Content type detected from the file's leading bytes, lowercased and
    /// stripped of any parameters. Computed once and cached for the life
    /// of this value; an unreadable file yields the empty string.
    pub fn mime_type(&self) -> &str {
        self.mime_type
            .get_or_init(|| match detect_mime_type(&self.tmp_path) {
                Some(raw) => primary_mime_token(&raw),
                None => String::new(),
            })
            .as_str()
    }

    /// MD5 digest of the file's content as lowercase hex, recomputed on
    /// every call. An unreadable file yields the empty string.
    pub fn md5(&self) -> String {
        let mut file = match fs::File::open(&self.tmp_path) {
            Ok(file) => file,
            Err(_) => return String::new(),
        };

        let mut hasher = Md5::new();
        if io::copy(&mut file, &mut hasher).is_err() {
            return String::new();
        }

        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// File size in bytes; 0 when the file is absent.
    pub fn size(&self) -> u64 {
        fs::metadata(&self.tmp_path).map(|m| m.len()).unwrap_or(0)
    }
}

/// Strategy for turning raw submissions into [`File`] entities, letting
/// embedders substitute their own entity construction.
pub trait FileFactory: Send + Sync {
    fn create(&self, tmp_path: &Path, client_name: Option<&str>, error: ErrorCode)
        -> Result<File>;
}

/// Factory used when no custom one is injected; builds a plain [`File`]
/// and never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFileFactory;

impl FileFactory for DefaultFileFactory {
    fn create(
        &self,
        tmp_path: &Path,
        client_name: Option<&str>,
        error: ErrorCode,
    ) -> Result<File> {
        Ok(File::new(tmp_path, client_name, error))
    }
}

fn detect_mime_type(path: &Path) -> Option<String> {
    let file = fs::File::open(path).ok()?;
    let mut head = Vec::with_capacity(MIME_PROBE_LEN as usize);
    file.take(MIME_PROBE_LEN).read_to_end(&mut head).ok()?;

    if head.is_empty() {
        return Some("application/x-empty".to_string());
    }

    if let Some(kind) = infer::get(&head) {
        return Some(kind.mime_type().to_string());
    }

    if looks_textual(&head) {
        Some("text/plain".to_string())
    } else {
        Some("application/octet-stream".to_string())
    }
}

// Printable text: no NUL bytes and valid UTF-8, tolerating a sequence cut
// off by the probe window.
fn looks_textual(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    }
}

fn primary_mime_token(raw: &str) -> String {
    raw.split(|c| c == ';' || c == ',')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}
