//! 변환 파이프라인 에러 타입
//!
//! [`TransformError`]는 인자 검증과 변환 실행에서 발생하는 에러를 표현합니다.
//! `From<TransformError> for SurvivalError` 변환으로 상위 레이어에 전파됩니다.

use survival_core::error::{MatrixError, ScenarioError, SurvivalError};
use survival_core::matrix::ToolKind;

/// 변환 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// 도구가 받아들이지 않는 인자
    #[error("{tool}: invalid arguments: {reason}")]
    InvalidArgs {
        /// 대상 도구
        tool: ToolKind,
        /// 거부 사유
        reason: String,
    },

    /// 외부 변환 도구 실행 실패
    #[error("failed to spawn '{program}': {reason}")]
    Spawn {
        /// 실행 파일
        program: String,
        /// 실패 사유
        reason: String,
    },

    /// 외부 변환 도구가 실패를 보고함
    #[error("magick transform failed: {reason}")]
    External {
        /// 실패 사유 (종료 상태, stderr 요약)
        reason: String,
    },

    /// 입력 버퍼가 JPEG 구조가 아님
    #[error("malformed jpeg: {0}")]
    Jpeg(#[from] crate::jpeg::JpegError),
}

impl From<TransformError> for SurvivalError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::InvalidArgs { .. } => SurvivalError::Matrix(MatrixError::Invalid {
                reason: err.to_string(),
            }),
            other => SurvivalError::Scenario(ScenarioError::Transform(other.to_string())),
        }
    }
}
