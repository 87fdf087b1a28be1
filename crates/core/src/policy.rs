//! 엣지 정책 옵션
//!
//! 정책 계층(엣지 프록시)이 읽는 환경변수를 모델링합니다.
//! 엔진은 분류에 이 값을 사용하지 않으며, 관측 가능한 HTTP 동작만 판단 근거로 삼습니다.
//! CLI는 실행 로그에 유효 정책을 남기는 용도로만 사용합니다.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 원격 전용 강제 토글
pub const ENV_REMOTE_ONLY: &str = "REMOTE_ONLY";
/// 원격 전용에서 제외되는 경로 접두어 목록 (쉼표 구분)
pub const ENV_PRESERVE_PATHS: &str = "PRESERVE_PATHS";
/// 발견 링크 누락 시 차단 토글
pub const ENV_DROP_IF_LINK_MISSING: &str = "DROP_IF_LINK_MISSING";
/// break-glass 호스트 목록 (쉼표 구분)
pub const ENV_BREAK_GLASS_HOSTS: &str = "BREAK_GLASS_HOSTS";

/// 유효 엣지 정책
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePolicy {
    pub remote_only: bool,
    pub preserve_paths: Vec<String>,
    pub drop_if_link_missing: bool,
    pub break_glass_hosts: Vec<String>,
}

impl Default for EdgePolicy {
    fn default() -> Self {
        Self {
            remote_only: true,
            preserve_paths: vec!["/media/preserve/".to_owned()],
            drop_if_link_missing: false,
            break_glass_hosts: Vec::new(),
        }
    }
}

impl EdgePolicy {
    /// 프로세스 환경변수에서 정책을 읽습니다.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수에서 정책을 읽습니다.
    ///
    /// 설정되지 않은 키는 기본값을 유지합니다. 토글은 `"1"`일 때만 켜집니다.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut policy = Self::default();

        if let Some(val) = lookup(ENV_REMOTE_ONLY) {
            policy.remote_only = val == "1";
        }
        if let Some(val) = lookup(ENV_PRESERVE_PATHS) {
            policy.preserve_paths = split_csv(&val);
        }
        if let Some(val) = lookup(ENV_DROP_IF_LINK_MISSING) {
            policy.drop_if_link_missing = val == "1";
        }
        if let Some(val) = lookup(ENV_BREAK_GLASS_HOSTS) {
            policy.break_glass_hosts = split_csv(&val);
        }

        policy
    }

    /// 정책 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = self.preserve_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::InvalidValue {
                field: "PRESERVE_PATHS".to_owned(),
                reason: format!("path '{path}' must start with '/'"),
            });
        }

        if self.break_glass_hosts.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidValue {
                field: "BREAK_GLASS_HOSTS".to_owned(),
                reason: "host must not be empty".to_owned(),
            });
        }

        Ok(())
    }

    /// 주어진 요청에 원격 전용 정책이 적용되는지 판단합니다.
    pub fn enforces_remote_only(&self, host: &str, path: &str) -> bool {
        if !self.remote_only {
            return false;
        }
        if self.break_glass_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            return false;
        }
        !self.preserve_paths.iter().any(|prefix| path.starts_with(prefix))
    }
}

fn split_csv(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}
