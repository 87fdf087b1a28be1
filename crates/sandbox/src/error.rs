//! 샌드박스 에러 타입
//!
//! [`SandboxError`]는 샌드박스 서버 기동과 프로세스 수명 관리에서 발생하는 에러를 표현합니다.
//! 모두 인프라 에러이며 실행 전체를 중단시킵니다.

use survival_core::error::{InfraError, SurvivalError};

/// 샌드박스 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// 정적 레지스트리에 없는 이름
    #[error("unknown sandbox: {0}")]
    UnknownSandbox(String),

    /// 프로세스 실행 실패
    #[error("failed to spawn sandbox '{sandbox}': {reason}")]
    Spawn {
        /// 샌드박스 이름
        sandbox: String,
        /// 실패 사유
        reason: String,
    },

    /// 시간 안에 헬스 체크를 통과하지 못함
    #[error("sandbox '{sandbox}' on port {port} is unhealthy: {reason}")]
    Unhealthy {
        /// 샌드박스 이름
        sandbox: String,
        /// 바인딩 포트
        port: u16,
        /// 마지막 실패 사유
        reason: String,
    },

    /// 헬스 체크 전에 프로세스가 종료됨
    #[error("sandbox '{sandbox}' exited during startup: {status}")]
    Exited {
        /// 샌드박스 이름
        sandbox: String,
        /// 종료 상태
        status: String,
    },

    /// 리스너 바인딩 실패
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// 바인딩 주소
        addr: String,
        /// 실패 사유
        reason: String,
    },

    /// 서빙 중 I/O 실패
    #[error("sandbox '{sandbox}' stopped serving: {reason}")]
    Serve {
        /// 샌드박스 이름
        sandbox: String,
        /// 실패 사유
        reason: String,
    },

    /// 종료 처리 실패
    #[error("failed to stop sandbox '{sandbox}': {reason}")]
    Stop {
        /// 샌드박스 이름
        sandbox: String,
        /// 실패 사유
        reason: String,
    },
}

impl From<SandboxError> for SurvivalError {
    fn from(err: SandboxError) -> Self {
        let infra = match err {
            SandboxError::UnknownSandbox(name) => InfraError::UnknownSandbox(name),
            SandboxError::Spawn { sandbox, reason } => InfraError::SpawnFailed { sandbox, reason },
            SandboxError::Unhealthy {
                sandbox,
                port,
                reason,
            } => InfraError::Unhealthy {
                sandbox,
                port,
                reason,
            },
            SandboxError::Exited { sandbox, status } => InfraError::SpawnFailed {
                sandbox,
                reason: format!("exited during startup: {status}"),
            },
            SandboxError::Bind { addr, reason } => InfraError::SpawnFailed {
                sandbox: addr,
                reason,
            },
            SandboxError::Serve { sandbox, reason } => InfraError::SpawnFailed { sandbox, reason },
            SandboxError::Stop { sandbox, reason } => InfraError::StopFailed { sandbox, reason },
        };
        SurvivalError::Infra(infra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_keeps_port() {
        let err = SandboxError::Unhealthy {
            sandbox: "preserve-embed".to_owned(),
            port: 4102,
            reason: "connection refused".to_owned(),
        };
        let top: SurvivalError = err.into();
        assert!(matches!(
            top,
            SurvivalError::Infra(InfraError::Unhealthy { port: 4102, .. })
        ));
        assert!(top.to_string().contains("4102"));
    }

    #[test]
    fn exited_maps_to_spawn_failure() {
        let err = SandboxError::Exited {
            sandbox: "remote-only".to_owned(),
            status: "exit status: 2".to_owned(),
        };
        let top: SurvivalError = err.into();
        assert!(top.to_string().contains("exited during startup"));
    }
}
