//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 샌드박스 종류, 실패 분류 코드, 시나리오 결과처럼
//! 엔진·샌드박스·리포트가 모두 공유하는 데이터 구조를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 샌드박스 종류
///
/// 전달 정책 변형 하나당 하나의 값이 대응하는 닫힌 집합입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxKind {
    /// 메타데이터를 제거하는 오리진
    StripHappy,
    /// 임베디드 클레임을 보존하는 오리진
    PreserveEmbed,
    /// 원격 매니페스트만 허용하는 격리 오리진
    RemoteOnly,
}

impl SandboxKind {
    /// 모든 샌드박스 종류 (레지스트리 순서)
    pub const ALL: [SandboxKind; 3] = [Self::StripHappy, Self::PreserveEmbed, Self::RemoteOnly];

    /// 직렬화 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StripHappy => "strip-happy",
            Self::PreserveEmbed => "preserve-embed",
            Self::RemoteOnly => "remote-only",
        }
    }

    /// 샌드박스가 `X-C2-Policy` 헤더로 선언하는 정책 값
    pub fn declared_policy(self) -> &'static str {
        match self {
            Self::PreserveEmbed => "preserve-allowed",
            Self::StripHappy | Self::RemoteOnly => "remote-only",
        }
    }

    /// 격리 헤더(CSP, nosniff)를 요구하는지 여부
    pub fn requires_isolation_headers(self) -> bool {
        matches!(self, Self::RemoteOnly)
    }
}

impl fmt::Display for SandboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SandboxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown sandbox '{s}'"))
    }
}

/// 실패 분류 코드
///
/// 모든 시나리오 결과는 정확히 하나의 코드로 끝납니다.
/// 선언 순서가 `Ord` 순서이며 리포트 히스토그램의 출력 순서가 됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    /// 출처 정보가 살아남음
    Survived,
    /// 매니페스트 조회 실패 또는 다이제스트 불일치
    BrokenManifest,
    /// 발견 링크 없음
    BrokenLink,
    /// 정책 헤더 누락 또는 모순
    BrokenHeaders,
    /// 임베디드 클레임 소실
    DestroyedEmbed,
    /// 콘텐츠 무결성 실패
    DestroyedContent,
    /// 그 외 비정상 응답
    Inaccessible,
    /// 404 응답
    #[serde(rename = "INACCESSIBLE_404")]
    Inaccessible404,
    /// 전송 계층 실패 (연결 거부, 타임아웃)
    InaccessibleTimeout,
}

impl FailureCode {
    /// 모든 코드 (선언 순서)
    pub const ALL: [FailureCode; 9] = [
        Self::Survived,
        Self::BrokenManifest,
        Self::BrokenLink,
        Self::BrokenHeaders,
        Self::DestroyedEmbed,
        Self::DestroyedContent,
        Self::Inaccessible,
        Self::Inaccessible404,
        Self::InaccessibleTimeout,
    ];

    /// 직렬화 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Survived => "SURVIVED",
            Self::BrokenManifest => "BROKEN_MANIFEST",
            Self::BrokenLink => "BROKEN_LINK",
            Self::BrokenHeaders => "BROKEN_HEADERS",
            Self::DestroyedEmbed => "DESTROYED_EMBED",
            Self::DestroyedContent => "DESTROYED_CONTENT",
            Self::Inaccessible => "INACCESSIBLE",
            Self::Inaccessible404 => "INACCESSIBLE_404",
            Self::InaccessibleTimeout => "INACCESSIBLE_TIMEOUT",
        }
    }

    /// 출처 정보가 원격으로 살아남았는지 여부
    pub fn is_survival(self) -> bool {
        matches!(self, Self::Survived)
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 매니페스트 조회 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFetch {
    /// HTTP 상태 코드. 0 = URL 미발견, -1 = 전송 계층 실패
    pub status: i32,
    /// 다이제스트 일치 여부
    pub hash_alignment: bool,
    /// 해석된 매니페스트 URL (미발견 시 빈 문자열)
    pub url: String,
}

impl ManifestFetch {
    /// URL을 찾지 못한 상태
    pub fn not_discovered() -> Self {
        Self {
            status: 0,
            hash_alignment: false,
            url: String::new(),
        }
    }
}

/// 단계별 소요 시간 (밀리초)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    /// 헤더 프로브
    pub edge_worker: u64,
    /// 콘텐츠 조회
    pub origin: u64,
    /// 매니페스트 해석
    pub manifest_fetch: u64,
}

/// 시나리오 하나의 실행 결과
///
/// 러너가 생성한 뒤에는 변경되지 않습니다.
/// `error`는 정책 실패가 아닌 예외적 실패일 때만 존재합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_id: String,
    pub sandbox: SandboxKind,
    pub remote_survives: bool,
    pub embed_survives: bool,
    /// 소문자 키로 정규화된 응답 헤더
    pub headers_snapshot: BTreeMap<String, String>,
    pub manifest_fetch: ManifestFetch,
    pub timings_ms: Timings,
    pub failure_code: FailureCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} remote={} embed={}",
            self.scenario_id,
            self.sandbox,
            self.failure_code,
            self.remote_survives,
            self.embed_survives,
        )
    }
}
