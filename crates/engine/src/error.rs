//! 엔진 에러 타입
//!
//! - [`ProbeError`]: 프로브 하나의 예외적 실패. 해당 시나리오만 중단하고 결과의 `error`에 기록됩니다.
//! - [`EngineError`]: 매트릭스 실행 전체를 중단하는 에러.

use survival_core::error::{InfraError, ScenarioError, SurvivalError};

/// 프로브 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// 연결 거부, 타임아웃 등 전송 계층 실패
    #[error("transport failure for {url}: {reason}")]
    Transport {
        url: String,
        reason: String,
        /// 요청 타임아웃으로 끝났는지 여부
        timed_out: bool,
    },

    /// 성공이 아닌 HTTP 상태
    #[error("{url} returned HTTP {status}{}", detail_suffix(.detail))]
    Status {
        url: String,
        status: u16,
        /// 샌드박스가 보고한 변환 실패 사유 (`X-Transform-Error`)
        detail: Option<String>,
    },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl ProbeError {
    pub(crate) fn transport(url: &str, err: &reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_owned(),
            reason: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }
}

impl From<ProbeError> for SurvivalError {
    fn from(err: ProbeError) -> Self {
        SurvivalError::Scenario(ScenarioError::Probe(err.to_string()))
    }
}

/// 매트릭스 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// HTTP 클라이언트 생성 실패
    #[error("failed to build probe client: {reason}")]
    Client { reason: String },

    /// 시나리오가 참조하는 샌드박스의 주소가 없음
    #[error("no endpoint for sandbox '{sandbox}' (scenario '{scenario_id}')")]
    MissingEndpoint {
        scenario_id: String,
        sandbox: String,
    },

    /// 시나리오 태스크 비정상 종료
    #[error("scenario task failed: {reason}")]
    Task { reason: String },

    /// 운영자 인터럽트로 실행 취소
    #[error("run cancelled")]
    Cancelled,
}

impl From<EngineError> for SurvivalError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MissingEndpoint { sandbox, .. } => {
                SurvivalError::Infra(InfraError::UnknownSandbox(sandbox))
            }
            EngineError::Cancelled => SurvivalError::Scenario(ScenarioError::Cancelled),
            EngineError::Client { reason } => SurvivalError::Infra(InfraError::Engine {
                stage: "probe client".to_owned(),
                reason,
            }),
            EngineError::Task { reason } => SurvivalError::Infra(InfraError::Engine {
                stage: "scenario task".to_owned(),
                reason,
            }),
        }
    }
}
