use opsledger_lib::error::AppError;
use opsledger_lib::models::settings::{EngineSettings, DEFAULT_TIMEZONE};
use opsledger_lib::services::settings_service::SettingsService;
use tempfile::tempdir;

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempdir().expect("temp dir");
    let service = SettingsService::from_path(dir.path().join("absent.yaml")).expect("service");
    assert_eq!(service.current(), EngineSettings::default());
    assert_eq!(service.current().timezone, DEFAULT_TIMEZONE);

    let defaults = SettingsService::load(None).expect("defaults");
    assert_eq!(defaults.current(), EngineSettings::default());
}

#[test]
fn test_yaml_overrides_are_merged_with_defaults() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("engine.yaml");
    std::fs::write(
        &path,
        r#"
timezone: Europe/London
batchSize: 50
tolerances:
  revenuePct: 2.0
categoryRules:
  synonyms:
    kitchen: [grill, pizzeria]
"#,
    )
    .expect("write settings");

    let service = SettingsService::load(Some(path.as_path())).expect("load");
    let settings = service.current();
    assert_eq!(settings.timezone, "Europe/London");
    assert_eq!(settings.batch_size, 50);
    assert_eq!(settings.tolerances.revenue_pct, 2.0);
    assert_eq!(settings.tolerances.productivity_pct, 2.5);
    assert_eq!(settings.max_concurrent_subjects, 4);
    assert_eq!(
        settings.category_rules.synonyms.get("kitchen").map(Vec::len),
        Some(2)
    );
    assert_eq!(service.timezone().expect("tz"), chrono_tz::Europe::London);
}

#[test]
fn test_reload_picks_up_changes() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("engine.yaml");
    std::fs::write(&path, "batchSize: 10\n").expect("write settings");

    let service = SettingsService::from_path(&path).expect("load");
    assert_eq!(service.current().batch_size, 10);

    std::fs::write(&path, "batchSize: 20\n").expect("rewrite settings");
    let reloaded = service.reload().expect("reload");
    assert_eq!(reloaded.batch_size, 20);
    assert_eq!(service.current().batch_size, 20);
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = tempdir().expect("temp dir");

    let cases = [
        ("timezone: Mars/Olympus\n", "timezone"),
        ("batchSize: 0\n", "batch"),
        ("severity:\n  minorPct: 20\n  majorPct: 10\n", "severity"),
        ("workerNameSimilarity: 1.5\n", "similarity"),
        ("tolerances:\n  hoursPct: -1\n", "tolerance"),
    ];
    for (index, (yaml, label)) in cases.iter().enumerate() {
        let path = dir.path().join(format!("bad-{index}.yaml"));
        std::fs::write(&path, yaml).expect("write settings");
        let result = SettingsService::from_path(&path);
        assert!(
            matches!(result, Err(AppError::Validation { .. })),
            "{label} should be rejected"
        );
    }
}

#[test]
fn test_malformed_yaml_is_a_config_error() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "batchSize: [unterminated\n").expect("write settings");
    assert!(matches!(
        SettingsService::from_path(&path),
        Err(AppError::Config(_))
    ));
}
