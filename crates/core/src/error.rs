//! 에러 타입: 도메인별 에러 정의
//!
//! 하위 크레이트는 각자의 상세 에러 타입을 두고,
//! `From<...> for SurvivalError` 변환으로 여기 정의된 범주로 합쳐집니다.
//! 범주는 실행 결과(종료 코드)를 결정하는 단위입니다.

/// Survival 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SurvivalError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 시나리오 매트릭스 에러 (로드 시점에 실행 전체를 중단)
    #[error("matrix error: {0}")]
    Matrix(#[from] MatrixError),

    /// 인프라 에러 (샌드박스 기동/종료, 실행 엔진 내부 실패)
    #[error("infrastructure error: {0}")]
    Infra(#[from] InfraError),

    /// 시나리오 단위 에러 (변환 또는 프로브 실패)
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// 리포트 출력 에러
    #[error("emit error: {0}")]
    Emit(#[from] EmitError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 시나리오 매트릭스 에러
///
/// 시나리오에 귀속되는 에러는 모두 `scenario_id`를 포함합니다.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    /// 매트릭스 파일을 찾을 수 없음
    #[error("matrix file not found: {path}")]
    FileNotFound { path: String },

    /// 입력 크기 초과
    #[error("matrix too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// 문서 파싱 실패
    #[error("failed to parse matrix: {reason}")]
    ParseFailed { reason: String },

    /// 문서 수준 검증 실패
    #[error("invalid matrix: {reason}")]
    Invalid { reason: String },

    /// 알 수 없는 변환 도구
    #[error("scenario '{scenario_id}': unknown transform tool '{tool}'")]
    UnknownTool { scenario_id: String, tool: String },

    /// 알 수 없는 샌드박스
    #[error("scenario '{scenario_id}': unknown sandbox '{sandbox}'")]
    UnknownSandbox {
        scenario_id: String,
        sandbox: String,
    },

    /// 시나리오 ID 중복
    #[error("duplicate scenario id: '{scenario_id}'")]
    DuplicateId { scenario_id: String },

    /// 시나리오 필드 검증 실패
    #[error("scenario '{scenario_id}': {reason}")]
    InvalidScenario { scenario_id: String, reason: String },
}

/// 인프라 에러
#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    /// 등록되지 않은 샌드박스 이름
    #[error("unknown sandbox: {0}")]
    UnknownSandbox(String),

    /// 프로세스 실행 실패
    #[error("failed to spawn sandbox '{sandbox}': {reason}")]
    SpawnFailed { sandbox: String, reason: String },

    /// 헬스 체크 실패
    #[error("sandbox '{sandbox}' on port {port} is unhealthy: {reason}")]
    Unhealthy {
        sandbox: String,
        port: u16,
        reason: String,
    },

    /// 종료 처리 실패
    #[error("failed to stop sandbox '{sandbox}': {reason}")]
    StopFailed { sandbox: String, reason: String },

    /// 샌드박스와 무관한 실행 엔진 내부 실패 (프로브 클라이언트 생성, 태스크 패닉)
    #[error("matrix engine failure in {stage}: {reason}")]
    Engine { stage: String, reason: String },
}

/// 시나리오 단위 에러
///
/// 실행 전체를 중단시키지 않으며, 결과의 `error` 필드로 기록됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// 변환 파이프라인 실패
    #[error("transform failed: {0}")]
    Transform(String),

    /// 프로브 실패
    #[error("probe failed: {0}")]
    Probe(String),

    /// 실행 취소
    #[error("run cancelled")]
    Cancelled,
}

/// 리포트 출력 에러
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// 직렬화 실패
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// 파일 쓰기 실패
    #[error("failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    /// 재계산된 통계와 기록된 통계 불일치
    #[error("report field '{field}' does not match its results")]
    Drift { field: String },
}
