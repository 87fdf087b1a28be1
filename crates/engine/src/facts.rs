//! 분류기 입력: 프로브가 관측한 사실
//!
//! 분류기는 HTTP를 모르고 이 구조체만 봅니다. 같은 사실이면 항상 같은 코드가 나옵니다.

use survival_core::types::SandboxKind;

use crate::error::ProbeError;
use crate::probe::{ContentProbe, HeaderProbe, LinkResolution};

/// 자산 접근 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetAccess {
    /// 2xx
    Ok,
    /// 연결 거부, 타임아웃 등
    TransportFailure,
    /// 404
    NotFound,
    /// 그 외 비정상 상태
    Failed(u16),
}

/// 매니페스트 조회 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestState {
    /// 발견 링크가 없어 시도하지 않음
    NotAttempted,
    /// 2xx로 받음
    Fetched { aligned: bool },
    /// 성공이 아닌 HTTP 상태
    Failed(u16),
    /// 전송 계층 실패
    TransportFailure,
}

/// 정책 헤더 관측값
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyHeaders {
    pub x_c2_policy: Option<String>,
    pub content_security_policy: bool,
    pub nosniff: bool,
}

/// 본문 관측값
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    /// 본문을 받지 못함
    Unknown,
    Observed {
        length: usize,
        well_formed: bool,
        has_claim: bool,
    },
}

/// 시나리오 하나의 관측 사실
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFacts {
    pub sandbox: SandboxKind,
    pub access: AssetAccess,
    /// 헤더 또는 마크업에서 발견 링크를 찾았는지 여부
    pub link_discovered: bool,
    pub manifest: ManifestState,
    pub policy_headers: PolicyHeaders,
    pub content: ContentState,
}

impl ProbeFacts {
    /// 세 프로브가 모두 끝난 경우
    pub fn observed(
        sandbox: SandboxKind,
        headers: &HeaderProbe,
        content: &ContentProbe,
        link: &LinkResolution,
    ) -> Self {
        let manifest = match (link.manifest_url.as_ref(), link.manifest_fetch_status) {
            (None, _) => ManifestState::NotAttempted,
            (Some(_), status) if status < 0 => ManifestState::TransportFailure,
            (Some(_), status) => match u16::try_from(status) {
                Ok(code) if (200..300).contains(&code) => ManifestState::Fetched {
                    aligned: link.hash_alignment,
                },
                Ok(code) => ManifestState::Failed(code),
                Err(_) => ManifestState::TransportFailure,
            },
        };

        Self {
            sandbox,
            access: AssetAccess::Ok,
            link_discovered: link.manifest_url.is_some(),
            manifest,
            policy_headers: PolicyHeaders {
                x_c2_policy: headers.x_c2_policy.clone(),
                content_security_policy: headers.get("content-security-policy").is_some(),
                nosniff: headers
                    .get("x-content-type-options")
                    .is_some_and(|v| v.trim().eq_ignore_ascii_case("nosniff")),
            },
            content: ContentState::Observed {
                length: content.length,
                well_formed: content.well_formed,
                has_claim: content.has_claim,
            },
        }
    }

    /// 프로브가 예외로 끝난 경우. 알려진 것은 접근 실패뿐입니다.
    pub fn from_error(sandbox: SandboxKind, err: &ProbeError) -> Self {
        let access = match err {
            ProbeError::Transport { .. } => AssetAccess::TransportFailure,
            ProbeError::Status { status: 404, .. } => AssetAccess::NotFound,
            ProbeError::Status { status, .. } => AssetAccess::Failed(*status),
        };

        Self {
            sandbox,
            access,
            link_discovered: false,
            manifest: ManifestState::NotAttempted,
            policy_headers: PolicyHeaders::default(),
            content: ContentState::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: Option<&str>, status: i32, aligned: bool) -> LinkResolution {
        LinkResolution {
            manifest_url: url.map(str::to_owned),
            manifest_fetch_status: status,
            hash_alignment: aligned,
            html_link_fallback: false,
        }
    }

    #[test]
    fn manifest_state_from_status() {
        let headers = HeaderProbe::default();
        let content = ContentProbe::default();
        let cases = [
            (link(None, 0, false), ManifestState::NotAttempted),
            (link(Some("u"), -1, false), ManifestState::TransportFailure),
            (link(Some("u"), 404, false), ManifestState::Failed(404)),
            (
                link(Some("u"), 200, true),
                ManifestState::Fetched { aligned: true },
            ),
        ];
        for (resolution, expected) in cases {
            let facts = ProbeFacts::observed(SandboxKind::StripHappy, &headers, &content, &resolution);
            assert_eq!(facts.manifest, expected);
            assert_eq!(facts.link_discovered, resolution.manifest_url.is_some());
        }
    }

    #[test]
    fn error_maps_to_access() {
        let not_found = ProbeError::Status {
            url: "u".to_owned(),
            status: 404,
            detail: None,
        };
        let server = ProbeError::Status {
            url: "u".to_owned(),
            status: 503,
            detail: None,
        };
        let refused = ProbeError::Transport {
            url: "u".to_owned(),
            reason: "connection refused".to_owned(),
            timed_out: false,
        };
        let kind = SandboxKind::RemoteOnly;
        assert_eq!(ProbeFacts::from_error(kind, &not_found).access, AssetAccess::NotFound);
        assert_eq!(ProbeFacts::from_error(kind, &server).access, AssetAccess::Failed(503));
        assert_eq!(
            ProbeFacts::from_error(kind, &refused).access,
            AssetAccess::TransportFailure
        );
    }

    #[test]
    fn nosniff_is_case_insensitive() {
        let mut headers = HeaderProbe::default();
        headers
            .headers
            .insert("x-content-type-options".to_owned(), " NoSniff ".to_owned());
        let facts = ProbeFacts::observed(
            SandboxKind::RemoteOnly,
            &headers,
            &ContentProbe::default(),
            &link(None, 0, false),
        );
        assert!(facts.policy_headers.nosniff);
        assert!(!facts.policy_headers.content_security_policy);
    }
}
