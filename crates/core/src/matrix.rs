//! 시나리오 매트릭스: 적대적 전달 경로 정의 파일 로딩 및 검증
//!
//! [`HostilePathMatrix`]는 실행 한 번에 한 번 로드되며 이후 변경되지 않습니다.
//! 알 수 없는 `tool`/`sandbox` 값은 로드 시점 에러이며, 실행 중에는 나타나지 않습니다.
//!
//! # 문서 형식
//! ```yaml
//! version: 1
//! defaults:
//!   manifest_mode: remote
//!   verify_host: verify.example.org
//!   manifest_host: manifests.example.org
//! scenarios:
//!   - id: strip-baseline
//!     sandbox: strip-happy
//!     transforms:
//!       - tool: magick
//!         args: ["-strip"]
//!     expected:
//!       remote_survives: true
//!       embed_survives: false
//! ```
//!
//! JSON 문서도 YAML 흐름 표기로 그대로 읽힙니다.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, SurvivalError};
use crate::types::SandboxKind;

/// 매트릭스 파일 최대 크기
pub const MAX_MATRIX_FILE_SIZE: usize = 10 * 1024 * 1024; // 10MB
/// 시나리오 최대 개수
pub const MAX_SCENARIOS: usize = 10_000;

/// 변환 도구 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    /// 콘텐츠 변환 (재압축, 크롭, 메타데이터 제거)
    Magick,
    /// HTTP 계층 전달 변환 시뮬레이션
    SimulateProxy,
    /// 항등 변환
    Copy,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [Self::Magick, Self::SimulateProxy, Self::Copy];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Magick => "magick",
            Self::SimulateProxy => "simulate-proxy",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| format!("unknown tool '{s}'"))
    }
}

/// 변환 단계 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    pub tool: ToolKind,
    #[serde(default)]
    pub args: Vec<String>,
}

/// 작성자가 선언한 임베디드 클레임 기대값
///
/// `"maybe"`는 어떤 관측 결과와도 모순되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbedExpectation {
    Known(bool),
    Maybe(MaybeTag),
}

/// `"maybe"` 리터럴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaybeTag {
    #[serde(rename = "maybe")]
    Maybe,
}

impl EmbedExpectation {
    /// 관측값이 기대와 모순되지 않는지 확인합니다.
    pub fn admits(self, observed: bool) -> bool {
        match self {
            Self::Known(expected) => expected == observed,
            Self::Maybe(_) => true,
        }
    }
}

impl fmt::Display for EmbedExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => write!(f, "{v}"),
            Self::Maybe(_) => f.write_str("maybe"),
        }
    }
}

/// 선언된 기대 결과 (strict 모드 비교 전용, 분류에는 쓰이지 않음)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    pub remote_survives: bool,
    pub embed_survives: EmbedExpectation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// 시나리오
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// 실행 간 안정적인 고유 ID
    pub id: String,
    pub sandbox: SandboxKind,
    /// 왼쪽부터 순서대로 적용
    #[serde(default)]
    pub transforms: Vec<Transform>,
    pub expected: ExpectedOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// 기본 정책 가정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// 매니페스트 발견 방식 (현재 `remote`만 지원)
    pub manifest_mode: String,
    pub verify_host: String,
    pub manifest_host: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            manifest_mode: "remote".to_owned(),
            verify_host: String::new(),
            manifest_host: String::new(),
        }
    }
}

/// 적대적 전달 경로 매트릭스
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostilePathMatrix {
    pub version: u32,
    pub defaults: Defaults,
    pub scenarios: Vec<Scenario>,
}

/// 시나리오를 개별 검증하기 위한 원시 문서 형태
#[derive(Deserialize)]
struct RawMatrix {
    version: u32,
    #[serde(default)]
    defaults: Defaults,
    #[serde(default)]
    scenarios: Vec<serde_yaml::Value>,
}

impl HostilePathMatrix {
    /// 파일에서 매트릭스를 로드하고 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SurvivalError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SurvivalError::Matrix(MatrixError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SurvivalError::Io(e)
            }
        })?;

        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > MAX_MATRIX_FILE_SIZE {
            return Err(MatrixError::TooLarge {
                size,
                max: MAX_MATRIX_FILE_SIZE,
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let matrix = Self::parse(&content)?;

        tracing::info!(
            path = %path.display(),
            version = matrix.version,
            scenarios = matrix.scenarios.len(),
            "loaded scenario matrix"
        );

        Ok(matrix)
    }

    /// 문자열에서 매트릭스를 파싱하고 검증합니다.
    pub fn parse(text: &str) -> Result<Self, MatrixError> {
        if text.len() > MAX_MATRIX_FILE_SIZE {
            return Err(MatrixError::TooLarge {
                size: text.len(),
                max: MAX_MATRIX_FILE_SIZE,
            });
        }

        let raw: RawMatrix = serde_yaml::from_str(text).map_err(|e| MatrixError::ParseFailed {
            reason: format!("YAML parse error: {e}"),
        })?;

        if raw.scenarios.len() > MAX_SCENARIOS {
            return Err(MatrixError::Invalid {
                reason: format!("too many scenarios: max {MAX_SCENARIOS}"),
            });
        }

        let scenarios = raw
            .scenarios
            .into_iter()
            .enumerate()
            .map(|(index, value)| parse_scenario(index, value))
            .collect::<Result<Vec<_>, _>>()?;

        let matrix = Self {
            version: raw.version,
            defaults: raw.defaults,
            scenarios,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    /// 문서 수준 불변 조건을 검증합니다.
    pub fn validate(&self) -> Result<(), MatrixError> {
        if self.version == 0 {
            return Err(MatrixError::Invalid {
                reason: "version must be >= 1".to_owned(),
            });
        }

        if self.defaults.manifest_mode != "remote" {
            return Err(MatrixError::Invalid {
                reason: format!(
                    "defaults.manifest_mode must be 'remote', got '{}'",
                    self.defaults.manifest_mode
                ),
            });
        }

        if self.scenarios.is_empty() {
            return Err(MatrixError::Invalid {
                reason: "matrix has no scenarios".to_owned(),
            });
        }

        let mut seen_ids = HashSet::new();
        for scenario in &self.scenarios {
            validate_scenario_id(&scenario.id)?;
            if !seen_ids.insert(scenario.id.as_str()) {
                return Err(MatrixError::DuplicateId {
                    scenario_id: scenario.id.clone(),
                });
            }
        }

        Ok(())
    }

    /// ID로 시나리오를 찾습니다.
    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }
}

/// 시나리오 하나를 원시 값에서 변환합니다.
///
/// 닫힌 열거형 필드는 serde 에러 대신 시나리오 ID를 담은 에러로 보고합니다.
fn parse_scenario(index: usize, value: serde_yaml::Value) -> Result<Scenario, MatrixError> {
    let scenario_id = value
        .get("id")
        .and_then(serde_yaml::Value::as_str)
        .map_or_else(|| format!("#{index}"), str::to_owned);

    match value.get("sandbox") {
        Some(serde_yaml::Value::String(name)) => {
            if name.parse::<SandboxKind>().is_err() {
                return Err(MatrixError::UnknownSandbox {
                    scenario_id,
                    sandbox: name.clone(),
                });
            }
        }
        Some(other) => {
            return Err(MatrixError::UnknownSandbox {
                scenario_id,
                sandbox: format!("{other:?}"),
            });
        }
        None => {
            return Err(MatrixError::InvalidScenario {
                scenario_id,
                reason: "missing field 'sandbox'".to_owned(),
            });
        }
    }

    if let Some(transforms) = value.get("transforms").and_then(|v| v.as_sequence()) {
        for transform in transforms {
            if let Some(tool) = transform.get("tool").and_then(serde_yaml::Value::as_str)
                && tool.parse::<ToolKind>().is_err()
            {
                return Err(MatrixError::UnknownTool {
                    scenario_id,
                    tool: tool.to_owned(),
                });
            }
        }
    }

    serde_yaml::from_value(value).map_err(|e| MatrixError::InvalidScenario {
        scenario_id,
        reason: e.to_string(),
    })
}

/// ID는 비어 있지 않아야 하며 URL 경로에 그대로 쓸 수 있어야 합니다.
fn validate_scenario_id(id: &str) -> Result<(), MatrixError> {
    if id.is_empty() {
        return Err(MatrixError::InvalidScenario {
            scenario_id: id.to_owned(),
            reason: "id must not be empty".to_owned(),
        });
    }

    let is_path_safe = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !is_path_safe {
        return Err(MatrixError::InvalidScenario {
            scenario_id: id.to_owned(),
            reason: "id may only contain [A-Za-z0-9._-]".to_owned(),
        });
    }

    Ok(())
}
