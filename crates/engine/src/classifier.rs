//! 실패 분류기
//!
//! [`ProbeFacts`]를 정확히 하나의 [`FailureCode`]로 매핑하는 순수 함수입니다.
//! 규칙은 고정된 순서로 평가되며 처음 일치한 규칙이 결과가 됩니다.
//!
//! | # | 조건 | 코드 |
//! |---|---|---|
//! | 1 | 자산 요청 전송 계층 실패 | `INACCESSIBLE_TIMEOUT` |
//! | 2 | 자산 404 | `INACCESSIBLE_404` |
//! | 3 | 그 외 성공이 아닌 자산 응답 | `INACCESSIBLE` |
//! | 4 | 헤더와 마크업 어디에도 발견 링크 없음 | `BROKEN_LINK` |
//! | 5 | 매니페스트 응답 실패 또는 전송 계층 실패 | `BROKEN_MANIFEST` |
//! | 6 | 매니페스트 다이제스트 불일치 | `BROKEN_MANIFEST` |
//! | 7 | 정책 헤더 누락 또는 불일치 | `BROKEN_HEADERS` |
//! | 8 | `preserve-embed`인데 클레임 없음 | `DESTROYED_EMBED` |
//! | 9 | 비어 있거나 구조가 깨진 본문 | `DESTROYED_CONTENT` |
//! | 10 | 그 외 | `SURVIVED` |

use survival_core::types::{FailureCode, SandboxKind};

use crate::facts::{AssetAccess, ContentState, ManifestState, PolicyHeaders, ProbeFacts};

/// 시나리오 하나의 분류 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub failure_code: FailureCode,
    pub remote_survives: bool,
    pub embed_survives: bool,
}

/// 관측 사실을 분류합니다.
pub fn classify(facts: &ProbeFacts) -> Classification {
    let failure_code = failure_code(facts);
    Classification {
        failure_code,
        remote_survives: failure_code.is_survival(),
        embed_survives: embed_survives(facts),
    }
}

fn failure_code(facts: &ProbeFacts) -> FailureCode {
    match facts.access {
        AssetAccess::TransportFailure => return FailureCode::InaccessibleTimeout,
        AssetAccess::NotFound => return FailureCode::Inaccessible404,
        AssetAccess::Failed(_) => return FailureCode::Inaccessible,
        AssetAccess::Ok => {}
    }

    if !facts.link_discovered {
        return FailureCode::BrokenLink;
    }

    match facts.manifest {
        ManifestState::Failed(_) | ManifestState::TransportFailure => {
            return FailureCode::BrokenManifest;
        }
        ManifestState::Fetched { aligned: false } => return FailureCode::BrokenManifest,
        // 링크가 발견되면 항상 조회를 시도하므로 도달하지 않음
        ManifestState::NotAttempted => return FailureCode::BrokenLink,
        ManifestState::Fetched { aligned: true } => {}
    }

    if !policy_headers_hold(facts.sandbox, &facts.policy_headers) {
        return FailureCode::BrokenHeaders;
    }

    if facts.sandbox == SandboxKind::PreserveEmbed
        && let ContentState::Observed { has_claim: false, .. } = facts.content
    {
        return FailureCode::DestroyedEmbed;
    }

    if content_destroyed(facts.content) {
        return FailureCode::DestroyedContent;
    }

    FailureCode::Survived
}

/// 정책 헤더가 샌드박스의 선언 정책과 같아야 하고,
/// 격리 샌드박스는 CSP와 `nosniff`도 보내야 합니다.
fn policy_headers_hold(sandbox: SandboxKind, headers: &PolicyHeaders) -> bool {
    let declared = headers
        .x_c2_policy
        .as_deref()
        .is_some_and(|policy| policy.trim() == sandbox.declared_policy());
    let isolated =
        !sandbox.requires_isolation_headers() || (headers.content_security_policy && headers.nosniff);
    declared && isolated
}

fn content_destroyed(content: ContentState) -> bool {
    match content {
        ContentState::Observed {
            length,
            well_formed,
            ..
        } => length == 0 || !well_formed,
        ContentState::Unknown => false,
    }
}

/// 임베디드 클레임 생존 여부
///
/// `preserve-embed`에서 자산에 접근 가능하고, 온전한 본문에서 클레임이 실제로 관측된 경우에만 참입니다.
fn embed_survives(facts: &ProbeFacts) -> bool {
    facts.sandbox == SandboxKind::PreserveEmbed
        && facts.access == AssetAccess::Ok
        && matches!(facts.content, ContentState::Observed { has_claim: true, .. })
        && !content_destroyed(facts.content)
}
