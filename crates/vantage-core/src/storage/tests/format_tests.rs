use std::path::Path;

use serde_json::{Value, json};
use tempfile::tempdir;

use crate::storage::error::StorageError;
use crate::storage::format::{self, DocumentFormat};

#[test]
fn test_format_from_extension() {
    assert_eq!(DocumentFormat::from_path(Path::new("schema.json")), Some(DocumentFormat::Json));
    assert_eq!(DocumentFormat::from_path(Path::new("SCHEMA.JSON")), Some(DocumentFormat::Json));
    #[cfg(feature = "yaml-config")]
    {
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_path(Path::new("a.yaml")), Some(DocumentFormat::Yaml));
    }
    #[cfg(feature = "toml-config")]
    assert_eq!(DocumentFormat::from_path(Path::new("a.toml")), Some(DocumentFormat::Toml));
    assert_eq!(DocumentFormat::from_path(Path::new("schema.txt")), None);
    assert_eq!(DocumentFormat::from_path(Path::new("schema")), None);
}

#[test]
fn test_deserialize_reports_format() {
    let err = format::deserialize::<Value>("{not json", DocumentFormat::Json).unwrap_err();
    match err {
        StorageError::Deserialize { format, .. } => assert_eq!(format, "JSON"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_write_then_read_creates_parent_dirs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("out.json");
    let value = json!({ "name": "demo", "items": [1, 2, 3] });

    format::write_document(&path, &value).unwrap();
    let read: Value = format::read_document(&path).unwrap();

    assert_eq!(read, value);
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_yaml_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.yaml");
    std::fs::write(&path, "name: demo\ncount: 3\n").unwrap();

    let read: Value = format::read_document(&path).unwrap();
    assert_eq!(read, json!({ "name": "demo", "count": 3 }));
}

#[test]
fn test_unsupported_and_missing_files() {
    let dir = tempdir().unwrap();

    let unsupported = dir.path().join("doc.ini");
    std::fs::write(&unsupported, "x=1").unwrap();
    assert!(matches!(
        format::read_document::<Value>(&unsupported),
        Err(StorageError::UnsupportedFormat { .. })
    ));

    let missing = dir.path().join("missing.json");
    match format::read_document::<Value>(&missing) {
        Err(StorageError::Io { operation, path, .. }) => {
            assert_eq!(operation, "read_to_string");
            assert_eq!(path, missing);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
