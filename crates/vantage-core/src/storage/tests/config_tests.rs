use tempfile::tempdir;

use crate::manager::RunMode;
use crate::storage::config::ValidatorConfig;

#[test]
fn test_config_defaults() {
    let config = ValidatorConfig::default();
    assert_eq!(config.log_level, "info");
    assert_eq!(config.run_mode, RunMode::All);
    assert!(config.print_progress);
    assert!(config.fail_on_check_failure);
}

#[test]
fn test_partial_config_uses_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vantage.json");
    std::fs::write(&path, r#"{ "run_mode": "self_to_end", "print_progress": false }"#).unwrap();

    let config = ValidatorConfig::load(&path).unwrap();

    assert_eq!(config.run_mode, RunMode::SelfToEnd);
    assert!(!config.print_progress);
    assert_eq!(config.log_level, "info");
    assert!(config.fail_on_check_failure);
}

#[cfg(feature = "toml-config")]
#[test]
fn test_toml_config_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vantage.toml");
    let config = ValidatorConfig {
        log_level: "debug".to_string(),
        run_mode: RunMode::OnlySelected,
        print_progress: false,
        fail_on_check_failure: false,
    };

    config.save(&path).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("run_mode = \"only_selected\""));
    assert_eq!(ValidatorConfig::load(&path).unwrap(), config);
}
