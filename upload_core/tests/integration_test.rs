use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use upload_core::{
    Extension, FileSystemStorage, MimeType, Size, UploadCoordinator, UploadInfo, UploadedFile,
    UploadedFiles,
};

fn received(temp: &TempDir, field: &str, name: &str, content: &[u8]) -> UploadedFiles {
    let mut input = UploadedFiles::new();
    let path = temp.path().join(name);
    fs::write(&path, content).unwrap();
    input.push(field, UploadedFile::received(path, name));
    input
}

#[test]
fn test_full_pipeline_stores_a_valid_upload() {
    let temp = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();
    let storage = Arc::new(FileSystemStorage::new(uploads.path(), false).unwrap());

    let input = received(&temp, "document", "notes.txt", b"meeting notes");

    let mut coordinator = UploadCoordinator::new("document", storage, &input).unwrap();
    coordinator.add_validations(vec![
        Box::new(Extension::allow(["txt", "md"])),
        Box::new(MimeType::new(["text/plain"])),
        Box::new(Size::from_human("1K")),
    ]);

    assert!(coordinator.is_uploaded());
    assert!(coordinator.process().unwrap());
    assert!(coordinator.errors().is_empty());

    let result = match coordinator.info() {
        UploadInfo::Single(result) => result,
        other => panic!("expected a single stored file, got {:?}", other),
    };

    assert_eq!(result.full_name, "notes.txt");
    assert_eq!(result.mime_type, "text/plain");
    assert_eq!(result.size, 13);
    assert_eq!(result.original_name.as_deref(), Some("notes.txt"));
    assert_eq!(result.checksum.len(), 32);
    assert_eq!(fs::read(&result.path).unwrap(), b"meeting notes");
}

#[test]
fn test_two_valid_files_produce_an_ordered_pair_of_results() {
    let temp = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();
    let storage = Arc::new(FileSystemStorage::new(uploads.path(), false).unwrap());

    let mut input = UploadedFiles::new();
    for name in ["alpha.txt", "beta.txt"] {
        let path = temp.path().join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        input.push("documents", UploadedFile::received(path, name));
    }

    let mut coordinator = UploadCoordinator::new("documents", storage, &input).unwrap();

    assert!(coordinator.process().unwrap());

    let results = coordinator.info().results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].full_name, "alpha.txt");
    assert_eq!(results[1].full_name, "beta.txt");
    assert!(results.iter().all(|r| r.path.exists()));
}

#[test]
fn test_failing_rule_yields_exactly_one_error_and_no_stored_file() {
    let temp = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();
    let storage = Arc::new(FileSystemStorage::new(uploads.path(), false).unwrap());

    let input = received(&temp, "document", "notes.txt", b"meeting notes");

    let mut coordinator = UploadCoordinator::new("document", storage, &input).unwrap();
    coordinator.add_validation(Box::new(Extension::allow(["pdf"])));

    assert_eq!(coordinator.process().unwrap(), false);
    assert_eq!(coordinator.errors().len(), 1);
    assert_eq!(
        coordinator.errors()[0],
        "The uploaded file extension [txt] is not allowed"
    );
    assert!(!coordinator.info().is_processed());
    assert_eq!(fs::read_dir(uploads.path()).unwrap().count(), 0);
}

#[test]
fn test_size_ceiling_from_human_string_blocks_large_files() {
    let temp = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();
    let storage = Arc::new(FileSystemStorage::new(uploads.path(), false).unwrap());

    let input = received(&temp, "payload", "payload.bin", &[7u8; 2048]);

    let mut coordinator = UploadCoordinator::new("payload", storage, &input).unwrap();
    coordinator.add_validation(Box::new(Size::from_human("1K")));

    assert_eq!(coordinator.process().unwrap(), false);
    assert_eq!(
        coordinator.errors(),
        ["The uploaded file size [2K] is too big, max file size is [1K]"]
    );
}

#[test]
fn test_wrong_field_key_means_nothing_was_uploaded() {
    let temp = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();
    let storage = Arc::new(FileSystemStorage::new(uploads.path(), false).unwrap());

    let input = received(&temp, "document", "notes.txt", b"meeting notes");

    let mut coordinator = UploadCoordinator::new("attachment", storage, &input).unwrap();

    assert!(!coordinator.is_uploaded());
    assert_eq!(coordinator.process().unwrap(), false);
    assert!(coordinator.errors().is_empty());
}

#[test]
fn test_results_serialize_to_json() {
    let temp = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();
    let storage = Arc::new(FileSystemStorage::new(uploads.path(), false).unwrap());

    let input = received(&temp, "document", "notes.txt", b"meeting notes");

    let mut coordinator = UploadCoordinator::new("document", storage, &input).unwrap();
    assert!(coordinator.process().unwrap());

    let result = match coordinator.info() {
        UploadInfo::Single(result) => result,
        other => panic!("expected a single stored file, got {:?}", other),
    };

    let json = serde_json::to_value(result).unwrap();
    assert_eq!(json["full_name"], "notes.txt");
    assert_eq!(json["error"], 0);
    assert_eq!(json["size"], 13);
}
