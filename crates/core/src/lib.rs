//! Survival 공통 타입, 에러, 설정
//!
//! 시나리오 매트릭스, 실패 분류 코드, 시나리오 결과처럼
//! 엔진·샌드박스·리포트 크레이트가 공유하는 정의를 모읍니다.

pub mod config;
pub mod error;
pub mod matrix;
pub mod metrics;
pub mod policy;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    ConfigError, EmitError, InfraError, MatrixError, ScenarioError, SurvivalError,
};

// 설정
pub use config::SurvivalConfig;

// 매트릭스
pub use matrix::{
    Defaults, EmbedExpectation, ExpectedOutcome, HostilePathMatrix, Scenario, ToolKind, Transform,
};

// 정책
pub use policy::EdgePolicy;

// 도메인 타입
pub use types::{FailureCode, ManifestFetch, SandboxKind, ScenarioResult, Timings};
