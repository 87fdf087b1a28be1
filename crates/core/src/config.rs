//! 설정 관리: survival.toml 파싱 및 런타임 설정
//!
//! [`SurvivalConfig`]는 엔진, 샌드박스 관리자, 리포트 출력의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SURVIVAL_PROBE_TIMEOUT_MS=2000` 형식)
//! 3. 설정 파일 (`survival.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), survival_core::error::SurvivalError> {
//! use survival_core::config::SurvivalConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SurvivalConfig::load("survival.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SurvivalConfig::parse("[runner]\nconcurrency = 8")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SurvivalError};

/// Survival 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurvivalConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 샌드박스 프로세스 설정
    #[serde(default)]
    pub sandbox: SandboxProcessConfig,
    /// 프로브 설정
    #[serde(default)]
    pub probe: ProbeConfig,
    /// 시나리오 러너 설정
    #[serde(default)]
    pub runner: RunnerConfig,
    /// 리포트 출력 설정
    #[serde(default)]
    pub report: ReportConfig,
}

impl SurvivalConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SurvivalError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SurvivalError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SurvivalError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SurvivalError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SurvivalError> {
        toml::from_str(toml_str).map_err(|e| {
            SurvivalError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SURVIVAL_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SURVIVAL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SURVIVAL_GENERAL_LOG_FORMAT");

        // Sandbox
        override_string(&mut self.sandbox.binary, "SURVIVAL_SANDBOX_BINARY");
        override_parsed(
            &mut self.sandbox.startup_timeout_ms,
            "SURVIVAL_SANDBOX_STARTUP_TIMEOUT_MS",
        );
        override_parsed(
            &mut self.sandbox.shutdown_grace_ms,
            "SURVIVAL_SANDBOX_SHUTDOWN_GRACE_MS",
        );
        override_string(
            &mut self.sandbox.magick_binary,
            "SURVIVAL_SANDBOX_MAGICK_BINARY",
        );

        // Probe
        override_parsed(&mut self.probe.timeout_ms, "SURVIVAL_PROBE_TIMEOUT_MS");
        override_string(&mut self.probe.user_agent, "SURVIVAL_PROBE_USER_AGENT");

        // Runner
        override_parsed(&mut self.runner.concurrency, "SURVIVAL_RUNNER_CONCURRENCY");
        override_parsed(&mut self.runner.strict, "SURVIVAL_RUNNER_STRICT");

        // Report
        override_string(&mut self.report.output_dir, "SURVIVAL_REPORT_OUTPUT_DIR");
        override_string(&mut self.report.json_file, "SURVIVAL_REPORT_JSON_FILE");
        override_string(&mut self.report.junit_file, "SURVIVAL_REPORT_JUNIT_FILE");
        override_string(
            &mut self.report.metrics_file,
            "SURVIVAL_REPORT_METRICS_FILE",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SurvivalError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.sandbox.startup_timeout_ms == 0 {
            return Err(invalid(
                "sandbox.startup_timeout_ms",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.sandbox.magick_binary.is_empty() {
            return Err(invalid(
                "sandbox.magick_binary",
                "must not be empty".to_owned(),
            ));
        }

        if self.probe.timeout_ms == 0 {
            return Err(invalid(
                "probe.timeout_ms",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.runner.concurrency == 0 {
            return Err(invalid(
                "runner.concurrency",
                "must be greater than 0".to_owned(),
            ));
        }

        for (field, value) in [
            ("report.json_file", &self.report.json_file),
            ("report.junit_file", &self.report.junit_file),
        ] {
            if value.is_empty() {
                return Err(invalid(field, "must not be empty".to_owned()));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> SurvivalError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 샌드박스 프로세스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxProcessConfig {
    /// `survival-sandboxd` 실행 파일 경로 (비어 있으면 현재 실행 파일 옆에서 찾음)
    pub binary: String,
    /// 샌드박스당 헬스 체크 대기 시간 (밀리초)
    pub startup_timeout_ms: u64,
    /// SIGTERM 후 강제 종료까지 대기 시간 (밀리초)
    pub shutdown_grace_ms: u64,
    /// 외부 이미지 변환 도구
    pub magick_binary: String,
}

impl Default for SandboxProcessConfig {
    fn default() -> Self {
        Self {
            binary: String::new(),
            startup_timeout_ms: 1000,
            shutdown_grace_ms: 2000,
            magick_binary: "magick".to_owned(),
        }
    }
}

impl SandboxProcessConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// 프로브 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// 요청당 타임아웃 (밀리초)
    pub timeout_ms: u64,
    /// 요청 User-Agent
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            user_agent: concat!("survival-probe/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 시나리오 러너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 동시에 실행할 시나리오 수
    pub concurrency: usize,
    /// 선언된 기대 결과와 다르면 실패 처리
    pub strict: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            strict: false,
        }
    }
}

/// 리포트 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 출력 디렉토리
    pub output_dir: String,
    /// JSON 리포트 파일명
    pub json_file: String,
    /// JUnit 리포트 파일명
    pub junit_file: String,
    /// Prometheus 텍스트 파일명 (비어 있으면 비활성화)
    pub metrics_file: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: "reports".to_owned(),
            json_file: "survival.json".to_owned(),
            junit_file: "survival.junit.xml".to_owned(),
            metrics_file: String::new(),
        }
    }
}

impl ReportConfig {
    pub fn json_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join(&self.json_file)
    }

    pub fn junit_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join(&self.junit_file)
    }

    pub fn metrics_path(&self) -> Option<PathBuf> {
        (!self.metrics_file.is_empty()).then(|| Path::new(&self.output_dir).join(&self.metrics_file))
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

/// 파싱 가능한 값만 반영하고, 실패하면 경고 후 기존 값을 유지합니다.
fn override_parsed<T>(target: &mut T, env_key: &str)
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Ok(val) = std::env::var(env_key) else {
        return;
    };
    match val.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(e) => warn!(
            env_key,
            value = val.as_str(),
            error = %e,
            expected = std::any::type_name::<T>(),
            "ignoring unparsable env override"
        ),
    }
}
