//! 정적 샌드박스 레지스트리
//!
//! 샌드박스 목록은 컴파일 시점에 고정되며 실행 중에 사용자가 바꿀 수 없습니다.
//! 테스트에서는 [`SandboxRegistry::new`]로 임의 포트를 가진 레지스트리를 만들 수 있습니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use survival_core::types::SandboxKind;

use crate::error::SandboxError;

/// 기본 바인딩 호스트
pub const SANDBOX_HOST: &str = "127.0.0.1";

/// 샌드박스 하나의 정적 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// 레지스트리 이름
    pub name: String,
    /// 바인딩 포트
    pub port: u16,
    /// 전달 정책 변형
    #[serde(rename = "type")]
    pub kind: SandboxKind,
}

impl SandboxConfig {
    /// `http://127.0.0.1:<port>`
    pub fn base_url(&self) -> String {
        format!("http://{SANDBOX_HOST}:{}", self.port)
    }

    /// 헬스 체크 URL
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url())
    }
}

/// 샌드박스 레지스트리
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRegistry {
    entries: Vec<SandboxConfig>,
}

impl Default for SandboxRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SandboxRegistry {
    /// 내장 레지스트리 (4101..4103)
    pub fn builtin() -> Self {
        let entries = [
            (SandboxKind::StripHappy, 4101),
            (SandboxKind::PreserveEmbed, 4102),
            (SandboxKind::RemoteOnly, 4103),
        ]
        .into_iter()
        .map(|(kind, port)| SandboxConfig {
            name: kind.as_str().to_owned(),
            port,
            kind,
        })
        .collect();

        Self { entries }
    }

    /// 지정한 항목으로 레지스트리를 만듭니다.
    pub fn new(entries: Vec<SandboxConfig>) -> Self {
        Self { entries }
    }

    /// 이름으로 조회합니다.
    pub fn get(&self, name: &str) -> Result<&SandboxConfig, SandboxError> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| SandboxError::UnknownSandbox(name.to_owned()))
    }

    /// 종류로 조회합니다.
    pub fn for_kind(&self, kind: SandboxKind) -> Result<&SandboxConfig, SandboxError> {
        self.entries
            .iter()
            .find(|entry| entry.kind == kind)
            .ok_or_else(|| SandboxError::UnknownSandbox(kind.as_str().to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SandboxConfig> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 샌드박스 종류별 기본 URL
///
/// 러너는 프로세스 관리자가 아니라 이 맵을 통해 샌드박스를 찾습니다.
/// 테스트는 인프로세스 서버 주소로 직접 채웁니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxEndpoints {
    urls: BTreeMap<SandboxKind, String>,
}

impl SandboxEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 URL을 등록합니다. 끝의 `/`는 제거합니다.
    pub fn insert(&mut self, kind: SandboxKind, base_url: impl Into<String>) {
        let url: String = base_url.into();
        self.urls.insert(kind, url.trim_end_matches('/').to_owned());
    }

    pub fn get(&self, kind: SandboxKind) -> Option<&str> {
        self.urls.get(&kind).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SandboxKind, &str)> {
        self.urls.iter().map(|(kind, url)| (*kind, url.as_str()))
    }
}
