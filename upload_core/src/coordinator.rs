//! Pipeline orchestration: normalize, validate, store

use std::sync::Arc;

use crate::error::Result;
use crate::file::{DefaultFileFactory, File, FileFactory};
use crate::models::{ErrorCode, FieldFiles, UploadInfo, UploadedFile, UploadedFiles};
use crate::storage::StorageBackend;
use crate::validation::{UploadErrorOk, ValidationRule, Validator};

/// Optional collaborators for [`UploadCoordinator::with_options`].
#[derive(Default)]
pub struct UploadOptions {
    /// Pre-populated rule chain; its rules run before the default
    /// upload-error rule.
    pub validator: Option<Validator>,
    /// Custom file construction strategy.
    pub factory: Option<Arc<dyn FileFactory>>,
}

/// Drives one request's uploads through normalization, validation and
/// storage. One instance handles exactly one submitted field.
pub struct UploadCoordinator {
    key: String,
    storage: Arc<dyn StorageBackend>,
    validator: Validator,
    files: Vec<File>,
    errors: Vec<String>,
    info: UploadInfo,
}

impl UploadCoordinator {
    pub fn new(
        key: impl Into<String>,
        storage: Arc<dyn StorageBackend>,
        input: &UploadedFiles,
    ) -> Result<Self> {
        Self::with_options(key, storage, input, UploadOptions::default())
    }

    /// Builds a coordinator for the files submitted under `key`. Fails
    /// only if a custom factory refuses one of the submissions.
    pub fn with_options(
        key: impl Into<String>,
        storage: Arc<dyn StorageBackend>,
        input: &UploadedFiles,
        options: UploadOptions,
    ) -> Result<Self> {
        let key = key.into();
        let factory = options
            .factory
            .unwrap_or_else(|| Arc::new(DefaultFileFactory));
        let files = normalize_field(&key, input, factory.as_ref())?;

        let mut validator = options.validator.unwrap_or_default();
        validator.add_rule(Box::new(UploadErrorOk));

        Ok(Self {
            key,
            storage,
            validator,
            files,
            errors: Vec::new(),
            info: UploadInfo::NotProcessed,
        })
    }

    /// Whether normalization produced at least one file for the field.
    pub fn is_uploaded(&self) -> bool {
        !self.files.is_empty()
    }

    /// Renames every held file; the extension stays untouched.
    pub fn set_filename(&mut self, name: &str) -> &mut Self {
        for file in &mut self.files {
            file.set_name(name);
        }
        self
    }

    pub fn add_validation(&mut self, rule: Box<dyn ValidationRule>) -> &mut Self {
        self.validator.add_rule(rule);
        self
    }

    pub fn add_validations(&mut self, rules: Vec<Box<dyn ValidationRule>>) -> &mut Self {
        self.validator.add_rules(rules);
        self
    }

    /// Runs the rule chain over every file, recording at most one error
    /// per file (the first failing rule wins). Each call re-validates
    /// from scratch. False when nothing was uploaded.
    pub fn is_valid(&mut self) -> bool {
        if !self.is_uploaded() {
            return false;
        }

        self.errors.clear();
        for file in &self.files {
            for rule in self.validator.rules() {
                if !rule.validate(file) {
                    self.errors.push(rule.error_message(file));
                    break;
                }
            }
        }

        self.errors.is_empty()
    }

    /// Validates and stores. Returns `Ok(false)` without touching storage
    /// when validation fails. Files whose error code is not `Ok` are
    /// skipped silently; a storage failure aborts before later files are
    /// attempted, leaving already stored ones in place.
    pub fn process(&mut self) -> Result<bool> {
        if !self.is_valid() {
            return Ok(false);
        }

        let mut results = Vec::new();
        for file in &self.files {
            if file.error_code() == ErrorCode::Ok {
                results.push(self.storage.upload(file)?);
            } else {
                tracing::debug!(
                    "Skipping file {} of field {} with upload error code {}",
                    file.full_name(),
                    self.key,
                    file.error_code().as_u8()
                );
            }
        }

        self.info = match results.len() {
            1 => UploadInfo::Single(results.remove(0)),
            _ => UploadInfo::Multiple(results),
        };

        Ok(true)
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn info(&self) -> &UploadInfo {
        &self.info
    }
}

fn normalize_field(
    key: &str,
    input: &UploadedFiles,
    factory: &dyn FileFactory,
) -> Result<Vec<File>> {
    let mut files = Vec::new();

    if let Some(field) = input.get(key) {
        match field {
            FieldFiles::Single(descriptor) => {
                files.push(create_file(factory, descriptor)?);
            }
            FieldFiles::Multiple(descriptors) => {
                for descriptor in descriptors {
                    files.push(create_file(factory, descriptor)?);
                }
            }
        }
    }

    Ok(files)
}

fn create_file(factory: &dyn FileFactory, descriptor: &UploadedFile) -> Result<File> {
    factory.create(
        &descriptor.tmp_path,
        descriptor.client_name.as_deref(),
        descriptor.error,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;
    use crate::storage::FileSystemStorage;
    use crate::validation::Required;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct RejectingFactory;

    impl FileFactory for RejectingFactory {
        fn create(
            &self,
            _tmp_path: &Path,
            _client_name: Option<&str>,
            _error: ErrorCode,
        ) -> Result<File> {
            Err(UploadError::Config("factory rejected the file".to_string()))
        }
    }

    struct PrefixingFactory;

    impl FileFactory for PrefixingFactory {
        fn create(
            &self,
            tmp_path: &Path,
            client_name: Option<&str>,
            error: ErrorCode,
        ) -> Result<File> {
            let mut file = File::new(tmp_path, client_name, error);
            let name = format!("custom_{}", file.name());
            file.set_name(&name);
            Ok(file)
        }
    }

    struct FailEverything;

    impl ValidationRule for FailEverything {
        fn validate(&self, _file: &File) -> bool {
            false
        }

        fn error_message(&self, _file: &File) -> String {
            "nothing passes".to_string()
        }
    }

    fn storage(dir: &TempDir) -> Arc<FileSystemStorage> {
        Arc::new(FileSystemStorage::new(dir.path(), false).unwrap())
    }

    fn input_with(temp: &TempDir, field: &str, names: &[&str]) -> UploadedFiles {
        let mut input = UploadedFiles::new();
        for name in names {
            let path = temp.path().join(name);
            fs::write(&path, format!("content of {}", name)).unwrap();
            input.push(field, UploadedFile::received(path, *name));
        }
        input
    }

    #[test]
    fn test_absent_field_yields_nothing_to_do() {
        let uploads = TempDir::new().unwrap();
        let input = UploadedFiles::new();

        let mut coordinator = UploadCoordinator::new("file", storage(&uploads), &input).unwrap();

        assert!(!coordinator.is_uploaded());
        assert!(!coordinator.is_valid());
        assert_eq!(coordinator.process().unwrap(), false);
        assert!(coordinator.errors().is_empty());
        assert!(!coordinator.info().is_processed());
    }

    #[test]
    fn test_single_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let input = input_with(&temp, "file", &["report.txt"]);

        let mut coordinator = UploadCoordinator::new("file", storage(&uploads), &input).unwrap();

        assert!(coordinator.is_uploaded());
        assert!(coordinator.process().unwrap());

        match coordinator.info() {
            UploadInfo::Single(result) => {
                assert_eq!(result.full_name, "report.txt");
                assert!(result.path.exists());
            }
            other => panic!("expected single result, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_files_keep_order() {
        let temp = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let input = input_with(&temp, "files", &["first.txt", "second.txt"]);

        let mut coordinator = UploadCoordinator::new("files", storage(&uploads), &input).unwrap();

        assert!(coordinator.process().unwrap());
        let results = coordinator.info().results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].full_name, "first.txt");
        assert_eq!(results[1].full_name, "second.txt");
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let temp = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let input = input_with(&temp, "file", &["report.txt"]);

        let mut coordinator = UploadCoordinator::new("file", storage(&uploads), &input).unwrap();
        coordinator.add_validations(vec![Box::new(FailEverything), Box::new(FailEverything)]);

        assert_eq!(coordinator.process().unwrap(), false);
        assert_eq!(coordinator.errors(), ["nothing passes"]);
        assert!(!coordinator.info().is_processed());
    }

    #[test]
    fn test_repeated_validation_does_not_accumulate_errors() {
        let temp = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let input = input_with(&temp, "file", &["report.txt"]);

        let mut coordinator = UploadCoordinator::new("file", storage(&uploads), &input).unwrap();
        coordinator.add_validation(Box::new(FailEverything));

        assert!(!coordinator.is_valid());
        assert!(!coordinator.is_valid());
        assert_eq!(coordinator.errors().len(), 1);
    }

    #[test]
    fn test_missing_file_descriptor_is_skipped_silently() {
        let uploads = TempDir::new().unwrap();
        let mut input = UploadedFiles::new();
        input.insert_single("file", UploadedFile::missing());

        let mut coordinator = UploadCoordinator::new("file", storage(&uploads), &input).unwrap();

        assert!(coordinator.is_uploaded());
        assert!(coordinator.process().unwrap());
        assert!(coordinator.errors().is_empty());
        assert!(coordinator.info().results().is_empty());
    }

    #[test]
    fn test_required_rule_rejects_missing_file_descriptor() {
        let uploads = TempDir::new().unwrap();
        let mut input = UploadedFiles::new();
        input.insert_single("file", UploadedFile::missing());

        let mut coordinator = UploadCoordinator::new("file", storage(&uploads), &input).unwrap();
        coordinator.add_validation(Box::new(Required));

        assert_eq!(coordinator.process().unwrap(), false);
        assert_eq!(coordinator.errors(), ["No file was chosen. Please select one."]);
    }

    #[test]
    fn test_set_filename_renames_before_storing() {
        let temp = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let input = input_with(&temp, "file", &["original.txt"]);

        let mut coordinator = UploadCoordinator::new("file", storage(&uploads), &input).unwrap();
        coordinator.set_filename("renamed upload");

        assert!(coordinator.process().unwrap());
        match coordinator.info() {
            UploadInfo::Single(result) => assert_eq!(result.full_name, "renamed_upload.txt"),
            other => panic!("expected single result, got {:?}", other),
        }
    }

    #[test]
    fn test_rejecting_factory_fails_construction() {
        let temp = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let input = input_with(&temp, "file", &["report.txt"]);

        let options = UploadOptions {
            factory: Some(Arc::new(RejectingFactory)),
            ..Default::default()
        };
        let result = UploadCoordinator::with_options("file", storage(&uploads), &input, options);

        assert!(matches!(result, Err(UploadError::Config(_))));
    }

    #[test]
    fn test_custom_factory_shapes_the_files() {
        let temp = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let input = input_with(&temp, "file", &["report.txt"]);

        let options = UploadOptions {
            factory: Some(Arc::new(PrefixingFactory)),
            ..Default::default()
        };
        let mut coordinator =
            UploadCoordinator::with_options("file", storage(&uploads), &input, options).unwrap();

        assert!(coordinator.process().unwrap());
        match coordinator.info() {
            UploadInfo::Single(result) => assert_eq!(result.full_name, "custom_report.txt"),
            other => panic!("expected single result, got {:?}", other),
        }
    }

    #[test]
    fn test_preseeded_validator_rules_run_first() {
        let temp = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let input = input_with(&temp, "file", &["report.txt"]);

        let mut validator = Validator::new();
        validator.add_rule(Box::new(FailEverything));

        let options = UploadOptions {
            validator: Some(validator),
            ..Default::default()
        };
        let mut coordinator =
            UploadCoordinator::with_options("file", storage(&uploads), &input, options).unwrap();

        assert!(!coordinator.is_valid());
        assert_eq!(coordinator.errors(), ["nothing passes"]);
    }
}
