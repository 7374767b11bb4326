//! Document loading and engine configuration tests
//!
//! - malformed documents are rejected before any task runs
//! - JSON and YAML files load to the same document
//! - `EngineConfig` from TOML drives provider selection and limits

use std::sync::Arc;

use aion::error::{AionError, FixSuggestion};
use aion::provider::MockProvider;
use aion::{Engine, EngineConfig, InitialContext, PipelineDocument, TaskStatus};
use serde_json::json;

// ============================================================================
// Malformed documents
// ============================================================================

#[tokio::test]
async fn test_malformed_documents_are_reported() {
    let engine = Engine::with_config(EngineConfig::default().without_tracing_sink());
    let cases = [
        json!({}),
        json!({"pipeline": []}),
        json!({"pipeline": "filter"}),
        json!({"pipeline": [{"condition": {}}]}),
        json!({"pipeline": [{"task": ""}]}),
        json!({"pipeline": [{"task": "sort", "on_failure": "explode"}]}),
        json!({"pipeline": [{"task": "sort", "on_failure": {"retry": {"retries": -1}}}]}),
    ];

    for case in cases {
        let report = engine.run_value(case.clone(), InitialContext::default()).await;
        let err = report.error().unwrap_or_else(|| panic!("accepted {case}"));
        assert!(
            matches!(err, AionError::MalformedPipeline { .. }),
            "{case} gave {err}"
        );
        assert!(err.fix_suggestion().is_some());
        assert!(report.log.is_empty());
    }
}

#[test]
fn test_syntax_errors_are_parse_errors() {
    let err = PipelineDocument::from_json_str("{\"pipeline\": [").unwrap_err();
    assert_eq!(err.code(), "AION-002");

    let err = PipelineDocument::from_yaml_str("pipeline: [\n  - task: sort\n").unwrap_err();
    assert!(matches!(err, AionError::Parse { .. }));
}

#[test]
fn test_yaml_file_matches_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let yaml_path = dir.path().join("pipeline.yaml");
    let json_path = dir.path().join("pipeline.json");
    std::fs::write(
        &yaml_path,
        "name: adults\npipeline:\n  - task: filter\n    condition:\n      field: age\n      operator: \">=\"\n      value: 18\n    on_failure: skip\n",
    )
    .unwrap();
    std::fs::write(
        &json_path,
        r#"{"name": "adults", "pipeline": [{"task": "filter", "condition": {"field": "age", "operator": ">=", "value": 18}, "on_failure": "skip"}]}"#,
    )
    .unwrap();

    let from_yaml = PipelineDocument::from_path(&yaml_path).unwrap();
    let from_json = PipelineDocument::from_path(&json_path).unwrap();

    assert_eq!(from_yaml, from_json);
    assert_eq!(from_yaml.name.as_deref(), Some("adults"));
}

#[test]
fn test_unknown_top_level_keys_are_kept() {
    let doc = PipelineDocument::from_value(json!({
        "version": "1.0",
        "pipeline": [{"task": "sort", "operation": {"field": "a"}}]
    }))
    .unwrap();

    assert_eq!(doc.to_value().unwrap()["version"], "1.0");
}

// ============================================================================
// Engine configuration
// ============================================================================

#[tokio::test]
async fn test_config_default_provider_used_by_model_call() {
    let config = EngineConfig::from_toml_str(
        "default_provider = \"mock\"\ntracing_sink = false\n\n[summary]\nmax_fields = 1\nmax_preview_chars = 8\n",
    )
    .unwrap();
    let engine = Engine::with_config(config);
    let mock = Arc::new(MockProvider::new());
    engine.register_provider(mock.clone());

    let report = engine
        .run_value(
            json!({"pipeline": [{"task": "model_call", "prompt": "Hi {{name}}"}]}),
            InitialContext::from_value(json!({"name": "Ana", "age": 3})),
        )
        .await;

    assert!(report.is_success(), "{:?}", report.error());
    assert_eq!(mock.last_request().unwrap().prompt, "Hi Ana");

    let entry = &report.log[0];
    assert_eq!(entry.status, TaskStatus::Success);
    assert_eq!(entry.input_summary.fields, vec!["name"]);
    assert!(entry.input_summary.fields_truncated);
    assert!(entry.input_summary.preview.ends_with("..."));
}

#[tokio::test]
async fn test_config_builders_drive_model_call() {
    let config = EngineConfig::default()
        .without_tracing_sink()
        .with_default_provider("mock")
        .with_model_concurrency(1);
    let engine = Engine::with_config(config);
    let mock = Arc::new(MockProvider::new().with_delay(std::time::Duration::from_millis(5)));
    engine.register_provider(mock.clone());

    let report = engine
        .run_value(
            json!({"pipeline": [{"task": "model_call", "prompt": "Tag {{id}}"}]}),
            InitialContext::from_value(json!([{"id": 1}, {"id": 2}, {"id": 3}])),
        )
        .await;

    assert!(report.is_success(), "{:?}", report.error());
    assert_eq!(mock.call_count(), 3);
    assert_eq!(mock.max_in_flight(), 1);
}

#[test]
fn test_config_env_overrides() {
    let config = EngineConfig::default()
        .with_vars(|name| match name {
            "AION_RUN_TIMEOUT_MS" => Some("250".to_string()),
            "AION_MODEL_CONCURRENCY" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.run_timeout_ms, Some(250));
    assert_eq!(config.model_concurrency, 2);
    assert_eq!(config.default_provider, "simulate");

    let err = EngineConfig::default()
        .with_vars(|name| (name == "AION_MODEL_CONCURRENCY").then(|| "0".to_string()))
        .unwrap_err();
    assert_eq!(err.code(), "AION-050");
}

#[test]
fn test_engine_lists_builtin_kinds() {
    let engine = Engine::new();
    assert_eq!(
        engine.registry().kinds(),
        vec!["aggregate", "export", "filter", "memory", "model_call", "sort", "transform"]
    );
    assert!(engine.providers().contains("simulate"));
}
