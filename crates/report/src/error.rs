//! 리포트 에러 타입

use survival_core::error::{EmitError, SurvivalError};

/// 리포트 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// 직렬화 실패
    #[error("failed to serialize report: {0}")]
    Serialize(String),

    /// 기존 리포트 파싱 실패
    #[error("failed to parse report: {0}")]
    Parse(String),

    /// 파일 읽기/쓰기 실패
    #[error("report I/O failed for {path}: {reason}")]
    Io { path: String, reason: String },

    /// 기록된 통계가 결과에서 재계산한 값과 다름
    #[error("report field '{field}' does not match its results")]
    Drift { field: String },
}

impl From<ReportError> for SurvivalError {
    fn from(err: ReportError) -> Self {
        let emit = match err {
            ReportError::Serialize(reason) | ReportError::Parse(reason) => {
                EmitError::Serialize(reason)
            }
            ReportError::Io { path, reason } => EmitError::Write { path, reason },
            ReportError::Drift { field } => EmitError::Drift { field },
        };
        SurvivalError::Emit(emit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_keeps_field_name() {
        let top: SurvivalError = ReportError::Drift {
            field: "scenarios_failed".to_owned(),
        }
        .into();
        assert!(matches!(top, SurvivalError::Emit(EmitError::Drift { ref field }) if field == "scenarios_failed"));
    }

    #[test]
    fn io_maps_to_write() {
        let top: SurvivalError = ReportError::Io {
            path: "/tmp/x.json".to_owned(),
            reason: "denied".to_owned(),
        }
        .into();
        assert!(top.to_string().contains("/tmp/x.json"));
    }
}
