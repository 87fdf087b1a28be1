//! 샌드박스 고정 자산
//!
//! 변형마다 결정적인 기준 자산(합성 베이스라인 JPEG) 하나와 매니페스트 문서 하나를 가집니다.
//! 매니페스트 해시는 샌드박스가 실제로 내보내는 매니페스트 바이트의 SHA-256입니다.
//!
//! - `strip-happy`: 메타데이터가 제거된 자산 (`-strip` 결과와 동일한 바이트)
//! - `preserve-embed`: `APP11` 클레임 세그먼트가 살아있는 자산
//! - `remote-only`: 클레임 없는 자산

use bytes::Bytes;
use sha2::{Digest, Sha256};
use survival_core::types::SandboxKind;
use survival_transform::jpeg::{APP0, APP11, COM, EOI, SOF0, SOI, SOS};

/// 매니페스트 컨텍스트
const MANIFEST_CONTEXT: &str = "https://w3id.org/c2pa/1.0";

/// 변형 하나의 고정 자산
#[derive(Debug, Clone)]
pub struct Fixture {
    pub kind: SandboxKind,
    /// 서빙되는 자산 바이트
    pub asset: Bytes,
    /// 서빙되는 매니페스트 바이트
    pub manifest: Bytes,
    /// `manifest`의 SHA-256 hex
    pub manifest_hash: String,
}

impl Fixture {
    /// 변형의 고정 자산을 만듭니다.
    pub fn for_kind(kind: SandboxKind) -> Self {
        let asset = match kind {
            SandboxKind::StripHappy => stripped_asset(),
            SandboxKind::PreserveEmbed => canonical_asset(kind, true),
            SandboxKind::RemoteOnly => canonical_asset(kind, false),
        };
        let manifest = manifest_document(kind);
        let manifest_hash = sha256_hex(&manifest);

        Self {
            kind,
            asset: Bytes::from(asset),
            manifest: Bytes::from(manifest),
            manifest_hash,
        }
    }
}

/// 위조 매니페스트 (`--fake-manifest`)
///
/// 해시가 어떤 변형의 정품 매니페스트와도 다릅니다.
#[derive(Debug, Clone)]
pub struct ForgedManifest {
    pub body: Bytes,
    pub hash: String,
}

impl Default for ForgedManifest {
    fn default() -> Self {
        let body = serde_json::json!({
            "@context": [MANIFEST_CONTEXT],
            "claim": {
                "signature": "forged-signature",
                "assertion_data": "forged-assertion-data",
            },
        })
        .to_string()
        .into_bytes();
        let hash = sha256_hex(&body);
        Self {
            body: Bytes::from(body),
            hash,
        }
    }
}

/// SHA-256 hex (소문자)
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    // 고정 페이로드는 모두 짧음
    let len = (payload.len() + 2) as u16;
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
}

fn jfif(out: &mut Vec<u8>) {
    segment(out, APP0, b"JFIF\0\x01\x02\0\0\x01\0\x01\0\0");
}

fn frame_and_scan(out: &mut Vec<u8>) {
    // 1x1 그레이스케일 베이스라인 프레임
    segment(out, SOF0, &[8, 0, 1, 0, 1, 1, 1, 0x11, 0]);
    segment(out, SOS, &[1, 1, 0, 0, 0x3F, 0]);
    out.extend_from_slice(&[0x7F, 0xA2, 0xFF, 0x00, 0x8A, 0x28, 0xA0]);
    out.extend_from_slice(&[0xFF, EOI]);
}

/// SOI, APP0, APP1(Exif), [APP11(claim)], COM, SOF0, SOS, scan, EOI
fn canonical_asset(kind: SandboxKind, with_claim: bool) -> Vec<u8> {
    let mut out = vec![0xFF, SOI];
    jfif(&mut out);

    let mut exif = b"Exif\0\0Software=".to_vec();
    exif.extend_from_slice(kind.as_str().as_bytes());
    segment(&mut out, 0xE1, &exif);

    if with_claim {
        // JUMBF 상자 헤더 흉내 + c2pa 레이블
        let mut claim = b"JP\0\x01\0\0\0\x1Ejumb\0\0\0\x16jumdc2pa".to_vec();
        claim.extend_from_slice(b".claim:");
        claim.extend_from_slice(kind.as_str().as_bytes());
        segment(&mut out, APP11, &claim);
    }

    segment(&mut out, COM, b"survival sandbox fixture");
    frame_and_scan(&mut out);
    out
}

/// `canonical_asset`에 `-strip`을 적용한 결과와 같은 바이트
fn stripped_asset() -> Vec<u8> {
    let mut out = vec![0xFF, SOI];
    jfif(&mut out);
    frame_and_scan(&mut out);
    out
}

fn manifest_document(kind: SandboxKind) -> Vec<u8> {
    let claim = match kind {
        SandboxKind::PreserveEmbed => serde_json::json!({
            "signature": "preserve-embed-signature",
            "assertion_data": {
                "c2pa.assertions": [{
                    "label": "c2pa.actions",
                    "data": {
                        "actions": [{
                            "action": "c2pa.created",
                            "softwareAgent": "survival-sandbox/preserve-embed",
                        }],
                    },
                }],
            },
        }),
        other => serde_json::json!({
            "signature": format!("{other}-signature"),
            "assertion_data": format!("{other}-assertion-data"),
        }),
    };

    serde_json::json!({
        "@context": [MANIFEST_CONTEXT],
        "claim": claim,
    })
    .to_string()
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use survival_transform::jpeg;

    #[test]
    fn assets_match_variant_semantics() {
        let preserve = Fixture::for_kind(SandboxKind::PreserveEmbed);
        let inspection = jpeg::inspect(&preserve.asset);
        assert!(inspection.well_formed);
        assert!(inspection.has_claim);

        for kind in [SandboxKind::StripHappy, SandboxKind::RemoteOnly] {
            let fixture = Fixture::for_kind(kind);
            let inspection = jpeg::inspect(&fixture.asset);
            assert!(inspection.well_formed, "{kind} asset must be well formed");
            assert!(!inspection.has_claim, "{kind} asset must not carry a claim");
        }
    }

    #[test]
    fn strip_happy_asset_equals_native_strip() {
        let canonical = canonical_asset(SandboxKind::StripHappy, true);
        let stripped = jpeg::strip_metadata(&canonical).unwrap();
        assert_eq!(stripped, stripped_asset());
    }

    #[test]
    fn manifest_hash_is_digest_of_served_bytes() {
        for kind in SandboxKind::ALL {
            let fixture = Fixture::for_kind(kind);
            assert_eq!(fixture.manifest_hash, sha256_hex(&fixture.manifest));
            assert_eq!(fixture.manifest_hash.len(), 64);
        }
    }

    #[test]
    fn manifests_are_distinct_and_forgery_differs() {
        let forged = ForgedManifest::default();
        let hashes: Vec<String> = SandboxKind::ALL
            .into_iter()
            .map(|kind| Fixture::for_kind(kind).manifest_hash)
            .collect();
        assert_ne!(hashes[0], hashes[1]);
        assert_ne!(hashes[1], hashes[2]);
        assert!(!hashes.contains(&forged.hash));
    }

    #[test]
    fn fixtures_are_deterministic() {
        let a = Fixture::for_kind(SandboxKind::PreserveEmbed);
        let b = Fixture::for_kind(SandboxKind::PreserveEmbed);
        assert_eq!(a.asset, b.asset);
        assert_eq!(a.manifest_hash, b.manifest_hash);
    }
}
