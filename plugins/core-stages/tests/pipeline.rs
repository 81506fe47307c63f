//! End-to-end runs of the core stages through `ManagerCore`

use std::path::Path;

use serde_json::{Value, json};
use vantage_core::{ManagerCore, PluginRegistry, SchemaDocument};

fn registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    core_stages::register(&mut registry).unwrap();
    registry
}

fn users_schema(file: &Path, report: &Path, check: Value) -> SchemaDocument {
    SchemaDocument::from_value(json!({
        "name": "users",
        "context_plugin": { "name": "inherit" },
        "check_plugins": [{
            "name": "required_keys",
            "data": check,
            "context_plugin": { "name": "json_file", "data": { "path": file } },
            "selector_plugins": [{ "name": "json_pointer", "data": { "pointer": "/users" } }],
        }, {
            "name": "non_empty",
            "context_plugin": { "name": "json_file", "data": { "path": file } },
            "selector_plugins": [
                { "name": "json_pointer", "data": { "pointer": "/users" } },
                { "name": "json_pointer", "data": { "pointer": "/0", "from_previous": true } },
            ],
        }],
        "resultor_plugins": [
            { "name": "log_report" },
            { "name": "json_report", "data": { "path": report } },
        ],
    }))
    .unwrap()
}

#[tokio::test]
async fn test_valid_document_passes() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("users.json");
    let report = dir.path().join("report.json");
    std::fs::write(&file, r#"{ "users": [{ "id": 1, "name": "ada" }] }"#).unwrap();

    let document = users_schema(&file, &report, json!({ "keys": ["id", "name"] }));
    let mut manager = ManagerCore::from_document(document, &registry()).unwrap();

    assert!(manager.run_all().await.unwrap());
    assert_eq!(manager.schema().progress(), 100.0);

    let written = SchemaDocument::load(&report).unwrap();
    assert!(written.validation_passed);
    assert_eq!(
        written.check_plugins[0].last_result.as_ref().map(|r| r.message.as_str()),
        Some("All required keys present")
    );
}

#[tokio::test]
async fn test_missing_key_fixed_from_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("users.json");
    let report = dir.path().join("report.json");
    std::fs::write(&file, r#"{ "users": [{ "id": 1 }, { "id": 2, "name": "bo" }] }"#).unwrap();

    let check = json!({
        "keys": ["id", "name"],
        "defaults": { "name": "anonymous" },
        "pointer": "/users",
    });
    let mut manager =
        ManagerCore::from_document(users_schema(&file, &report, check), &registry()).unwrap();

    assert!(manager.run_all().await.unwrap());
    let record = manager.schema().check_groups[0].check.last_result.clone().unwrap();
    assert_eq!(record.message, "Filled 1 missing key(s)");

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({ "users": [{ "id": 1, "name": "anonymous" }, { "id": 2, "name": "bo" }] })
    );

    // Later runs find the file already fixed
    for _ in 0..2 {
        assert!(manager.run_all().await.unwrap());
        let record = manager.schema().check_groups[0].check.last_result.clone().unwrap();
        assert_eq!(record.message, "All required keys present");
    }
}

#[tokio::test]
async fn test_unfixable_document_fails_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("users.json");
    let report = dir.path().join("report.json");
    std::fs::write(&file, r#"{ "users": [{ "name": "ada" }] }"#).unwrap();

    let document = users_schema(&file, &report, json!({ "keys": ["id"] }));
    let mut manager = ManagerCore::from_document(document, &registry()).unwrap();

    assert!(!manager.run_all().await.unwrap());
    assert_eq!(manager.schema().finished(), (false, "At least one check failed"));
    // Later groups and resultors still ran
    assert!(manager.schema().check_groups[1].check.last_result.is_some());
    assert!(report.exists());
}

#[tokio::test]
async fn test_missing_file_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("absent.json");
    let report = dir.path().join("report.json");

    let document = users_schema(&file, &report, json!({ "keys": ["id"] }));
    let mut manager = ManagerCore::from_document(document, &registry()).unwrap();

    let err = manager.run_all().await.unwrap_err();

    assert!(err.to_string().contains("not found"));
    assert!(!manager.schema().finished().0);
    assert!(!report.exists());
}
