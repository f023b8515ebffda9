use crate::file::File;
use crate::models::ErrorCode;
use crate::util::{format_size, size_in_bytes};

/// One validation concern. `error_message` is consulted only when
/// `validate` returned false for the same file.
pub trait ValidationRule: Send + Sync {
    fn validate(&self, file: &File) -> bool;
    fn error_message(&self, file: &File) -> String;
}

/// Ordered rule chain; rules are evaluated in insertion order.
#[derive(Default)]
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn add_rules(&mut self, rules: Vec<Box<dyn ValidationRule>>) -> &mut Self {
        self.rules.extend(rules);
        self
    }

    pub fn rules(&self) -> &[Box<dyn ValidationRule>] {
        &self.rules
    }

    pub fn reset(&mut self) -> &mut Self {
        self.rules.clear();
        self
    }
}

/// Accepts files whose upload machinery reported no failure. An absent
/// file is not a failure here; the `Required` rule exists for that.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadErrorOk;

impl ValidationRule for UploadErrorOk {
    fn validate(&self, file: &File) -> bool {
        matches!(file.error_code(), ErrorCode::Ok | ErrorCode::NoFile)
    }

    fn error_message(&self, file: &File) -> String {
        let message = match file.error_code() {
            ErrorCode::Ok => "",
            ErrorCode::ServerSizeLimit => {
                "The uploaded file exceeds the maximum size allowed by the server"
            }
            ErrorCode::FormSizeLimit => {
                "The uploaded file exceeds the maximum size specified in the form"
            }
            ErrorCode::Partial => "The uploaded file was only partially uploaded.",
            ErrorCode::NoFile => "No file was uploaded.",
            ErrorCode::NoTmpDir => "Missing a temporary folder.",
            ErrorCode::CantWrite => "Failed to write file to disk.",
            ErrorCode::ExtensionBlocked => "A server extension stopped the file upload.",
        };
        message.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Required;

impl ValidationRule for Required {
    fn validate(&self, file: &File) -> bool {
        file.error_code() != ErrorCode::NoFile && file.mime_type() != "application/x-empty"
    }

    fn error_message(&self, _file: &File) -> String {
        "No file was chosen. Please select one.".to_string()
    }
}

/// Extension allowlist or blocklist, case-insensitive.
#[derive(Debug, Clone)]
pub struct Extension {
    extensions: Vec<String>,
    exclude: bool,
}

impl Extension {
    pub fn allow(extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            extensions: lowercase_all(extensions),
            exclude: false,
        }
    }

    pub fn deny(extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            extensions: lowercase_all(extensions),
            exclude: true,
        }
    }
}

impl ValidationRule for Extension {
    fn validate(&self, file: &File) -> bool {
        let extension = file.extension().to_lowercase();
        let listed = self.extensions.iter().any(|e| *e == extension);
        if self.exclude {
            !listed
        } else {
            listed
        }
    }

    fn error_message(&self, file: &File) -> String {
        if self.exclude {
            format!(
                "The uploaded file extension [{}] is forbidden",
                file.extension()
            )
        } else {
            format!(
                "The uploaded file extension [{}] is not allowed",
                file.extension()
            )
        }
    }
}

/// Allowlist of detected content types, matched exactly.
#[derive(Debug, Clone)]
pub struct MimeType {
    mime_types: Vec<String>,
}

impl MimeType {
    pub fn new(mime_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mime_types: mime_types.into_iter().map(Into::into).collect(),
        }
    }
}

impl ValidationRule for MimeType {
    fn validate(&self, file: &File) -> bool {
        let detected = file.mime_type();
        self.mime_types.iter().any(|m| m == detected)
    }

    fn error_message(&self, file: &File) -> String {
        format!(
            "The uploaded file type [{}] is not allowed, expected [{}]",
            file.mime_type(),
            self.mime_types.join(", ")
        )
    }
}

/// Upper bound on file size in bytes.
#[derive(Debug, Clone, Copy)]
pub struct Size {
    max: u64,
}

impl Size {
    pub fn new(max_bytes: u64) -> Self {
        Self { max: max_bytes }
    }

    /// Ceiling given as a human size string like `"4M"`.
    pub fn from_human(max_size: &str) -> Self {
        Self {
            max: size_in_bytes(max_size),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max
    }
}

impl ValidationRule for Size {
    fn validate(&self, file: &File) -> bool {
        file.size() <= self.max
    }

    fn error_message(&self, file: &File) -> String {
        format!(
            "The uploaded file size [{}] is too big, max file size is [{}]",
            format_size(file.size() as i64),
            format_size(self.max as i64)
        )
    }
}

fn lowercase_all(values: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.into().to_lowercase())
        .collect()
}
