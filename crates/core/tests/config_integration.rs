//! survival.toml 통합 설정 테스트
//!
//! - survival.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use survival_core::config::SurvivalConfig;
use survival_core::error::{ConfigError, SurvivalError};

// =============================================================================
// survival.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../survival.toml.example");
    let config = SurvivalConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.sandbox.magick_binary, "magick");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../survival.toml.example");
    let config = SurvivalConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../survival.toml.example");
    let example = SurvivalConfig::parse(content).expect("should parse");
    let defaults = SurvivalConfig::default();

    assert_eq!(
        example.sandbox.startup_timeout_ms,
        defaults.sandbox.startup_timeout_ms
    );
    assert_eq!(
        example.sandbox.shutdown_grace_ms,
        defaults.sandbox.shutdown_grace_ms
    );
    assert_eq!(example.probe.timeout_ms, defaults.probe.timeout_ms);
    assert_eq!(example.runner.concurrency, defaults.runner.concurrency);
    assert_eq!(example.runner.strict, defaults.runner.strict);
    assert_eq!(example.report.output_dir, defaults.report.output_dir);
    assert_eq!(example.report.json_file, defaults.report.json_file);
    assert_eq!(example.report.junit_file, defaults.report.junit_file);
    assert_eq!(example.report.metrics_file, defaults.report.metrics_file);
}

// =============================================================================
// 부분 설정 로딩 테스트
// =============================================================================

#[test]
fn partial_config_runner_only() {
    let toml = r#"
[runner]
concurrency = 16
strict = true
"#;
    let config = SurvivalConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.runner.concurrency, 16);
    assert!(config.runner.strict);
    assert_eq!(config.probe.timeout_ms, 5000);
    assert_eq!(config.sandbox.startup_timeout_ms, 1000);
}

#[test]
fn partial_config_two_sections() {
    let toml = r#"
[sandbox]
binary = "/opt/survival/bin/survival-sandboxd"
startup_timeout_ms = 3000

[report]
output_dir = "target/survival"
"#;
    let config = SurvivalConfig::parse(toml).expect("should parse");

    assert_eq!(config.sandbox.binary, "/opt/survival/bin/survival-sandboxd");
    assert_eq!(config.sandbox.startup_timeout_ms, 3000);
    assert_eq!(config.sandbox.shutdown_grace_ms, 2000);
    assert_eq!(
        config.report.junit_path(),
        std::path::Path::new("target/survival").join("survival.junit.xml")
    );
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

/// 환경변수를 설정한 채로 클로저를 실행하고 원래 값으로 되돌립니다.
fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: 테스트는 serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var(key, value);
    }

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }

    result
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[probe]
timeout_ms = 5000
"#;

    let result = with_env("SURVIVAL_PROBE_TIMEOUT_MS", "750", || {
        let mut config = SurvivalConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.probe.timeout_ms
    });

    assert_eq!(result, 750);
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let strict = with_env("SURVIVAL_RUNNER_STRICT", "true", || {
        let mut config = SurvivalConfig::default();
        config.apply_env_overrides();
        config.runner.strict
    });

    assert!(strict);
}

#[test]
#[serial_test::serial]
fn env_override_unparsable_number_keeps_toml_value() {
    let toml = r#"
[runner]
concurrency = 2
"#;

    let concurrency = with_env("SURVIVAL_RUNNER_CONCURRENCY", "many", || {
        let mut config = SurvivalConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.runner.concurrency
    });

    assert_eq!(concurrency, 2);
}

#[tokio::test]
#[serial_test::serial]
async fn load_applies_env_then_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("survival.toml");
    std::fs::write(&path, "[runner]\nconcurrency = 3\n").expect("write");

    let original = std::env::var("SURVIVAL_RUNNER_CONCURRENCY").ok();
    // SAFETY: 테스트는 serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("SURVIVAL_RUNNER_CONCURRENCY", "0");
    }

    let result = SurvivalConfig::load(&path).await;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("SURVIVAL_RUNNER_CONCURRENCY", val),
            None => std::env::remove_var("SURVIVAL_RUNNER_CONCURRENCY"),
        }
    }

    assert!(matches!(
        result,
        Err(SurvivalError::Config(ConfigError::InvalidValue { ref field, .. }))
            if field == "runner.concurrency"
    ));
}

// =============================================================================
// 빈 파일 / 잘못된 형식 에러 테스트
// =============================================================================

#[test]
fn comments_only_parses_with_defaults() {
    let toml = r#"
# 주석만 있는 설정 파일
"#;
    let config = SurvivalConfig::parse(toml).expect("comments-only should parse");
    config.validate().expect("should validate");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[probe]
timeout_ms = "five seconds"
"#;
    let result = SurvivalConfig::parse(toml);
    assert!(matches!(
        result,
        Err(SurvivalError::Config(ConfigError::ParseFailed { .. }))
    ));
}
