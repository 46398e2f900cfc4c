//! Config load and validation tests.

use assert_fs::prelude::*;
use minion_core::{
    config::{self, LogFormat, MinionConfig},
    testing::valid_config,
    ConfigError, TenantId,
};
use predicates::prelude::predicate;
use rstest::rstest;

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

const FULL_CONFIG: &str = r#"
listen_port: 6123
internal_url: http://indexer:6123
registry_url: http://registry/v0
tenant_url: http://tenant/v0
minion_id: indexer
credential: session-token
aspects: [dcat-dataset-strings]
optional_aspects: [dataset-format, source]
write_aspect_defs:
  - id: dataset-quality
    name: Dataset quality rating
    jsonSchema:
      type: object
concurrency: 8
crawl_page_size: 250
log_format: json
"#;

#[test]
fn load_full_config_with_defaults_filled_in() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(FULL_CONFIG).expect("write config");

    let config = config::load_at(file.path()).expect("load");
    assert_eq!(config.minion_id, "indexer");
    assert_eq!(config.optional_aspects, vec!["dataset-format", "source"]);
    assert_eq!(config.write_aspect_defs[0].id, "dataset-quality");
    assert_eq!(config.write_aspect_defs[0].json_schema["type"], "object");
    assert_eq!(config.concurrency, 8);
    assert_eq!(config.crawl_page_size, Some(250));
    assert_eq!(config.log_format, LogFormat::Json);
    // serde defaults
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.retry_delay_ms, 1000);
    assert!(!config.multi_tenant);
    assert_eq!(config.tenant_refresh_interval_secs, 60);
    config.validate().expect("valid");
}

#[test]
fn load_missing_file_returns_not_found() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.yaml"));
}

#[test]
fn load_malformed_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("listen_port: [unclosed").expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn default_path_lives_under_dot_minion() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = config::default_path_at(home.path());
    home.child(".minion/config.yaml")
        .assert(predicate::path::missing());
    assert!(path.ends_with(".minion/config.yaml"));
}

// ---------------------------------------------------------------------------
// 2. Validation
// ---------------------------------------------------------------------------

fn with(change: impl FnOnce(&mut MinionConfig)) -> MinionConfig {
    let mut config = valid_config();
    change(&mut config);
    config
}

#[rstest]
#[case::zero_port(with(|c| c.listen_port = 0), "listen port")]
#[case::port_too_large(with(|c| c.listen_port = 70_000), "listen port")]
#[case::blank_id(with(|c| c.minion_id = String::new()), "minion id")]
#[case::whitespace_id(with(|c| c.minion_id = "  ".to_string()), "minion id")]
#[case::blank_internal_url(with(|c| c.internal_url = String::new()), "internal url")]
#[case::blank_registry_url(with(|c| c.registry_url = String::new()), "registry url")]
#[case::blank_credential(with(|c| c.credential = String::new()), "credential")]
#[case::blank_aspect(with(|c| c.aspects.push(String::new())), "blank aspect")]
#[case::blank_optional_aspect(with(|c| c.optional_aspects = vec![String::new()]), "blank aspect")]
#[case::multi_tenant_without_id(with(|c| c.multi_tenant = true), "tenant id")]
#[case::shrinking_backoff(with(|c| c.retry_backoff_factor = 0.5), "backoff")]
fn bad_config_is_rejected(#[case] config: MinionConfig, #[case] message: &str) {
    let err = config.validate().unwrap_err();
    assert!(
        err.to_string().contains(message),
        "expected '{message}' in '{err}'"
    );
}

#[rstest]
#[case(1)]
#[case(65_535)]
fn port_bounds_are_inclusive(#[case] port: u32) {
    let config = with(|c| c.listen_port = port);
    config.validate().expect("valid");
    assert_eq!(u32::from(config.port().expect("port")), port);
}

#[test]
fn multi_tenant_with_id_scopes_calls_to_that_tenant() {
    let config = with(|c| {
        c.multi_tenant = true;
        c.tenant_id = Some(TenantId(7));
    });
    config.validate().expect("valid");
    assert_eq!(config.scope_tenant(), TenantId(7));
    assert_eq!(valid_config().scope_tenant(), minion_core::DEFAULT_TENANT_ID);
}
