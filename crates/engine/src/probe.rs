//! 전달 표면 프로브
//!
//! 자산 URL에 HTTP 요청을 보내 관측 가능한 사실만 추출합니다.
//! 프로브는 공유 가변 상태가 없으므로 서로 다른 URL에 대해 동시에 호출해도 안전합니다.
//! 모든 요청은 [`ProbeConfig::timeout_ms`](survival_core::config::ProbeConfig)로 제한됩니다.
//!
//! - [`ProbeClient::probe_headers`]: HEAD, 헤더 스냅샷
//! - [`ProbeClient::probe_content`]: GET, 본문 무결성과 임베디드 클레임
//! - [`ProbeClient::probe_link_resolution`]: 발견 링크 → 매니페스트 조회 → 다이제스트 비교

use std::collections::BTreeMap;

use regex::Regex;
use reqwest::header::HeaderMap;
use sha2::{Digest, Sha256};
use survival_core::config::ProbeConfig;
use survival_core::types::ManifestFetch;
use survival_transform::jpeg;

use crate::error::{EngineError, ProbeError};

/// Link 헤더의 발견 링크 패턴
const LINK_HEADER_PATTERN: &str = r#"<([^>]+)>;\s*rel="c2pa-manifest""#;

/// 마크업의 발견 링크 패턴
const MARKUP_LINK_PATTERN: &str = r#"<link[^>]+rel="c2pa-manifest"[^>]+href="([^"]+)""#;

/// 발견 링크 관계 토큰
const LINK_RELATION: &str = r#"rel="c2pa-manifest""#;

/// 샌드박스 변환 실패 사유 헤더
const TRANSFORM_ERROR_HEADER: &str = "x-transform-error";

/// 매니페스트 해시 헤더
pub const MANIFEST_HASH_HEADER: &str = "x-manifest-hash";

// ─── 프로브 결과 ───────────────────────────────────────────────────

/// `probe_headers` 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderProbe {
    /// 소문자 키 헤더 맵
    pub headers: BTreeMap<String, String>,
    /// Link 헤더에 발견 링크가 있는지 여부
    pub link_header_present: bool,
    pub x_c2_policy: Option<String>,
    pub content_type: String,
    pub cache_control: Option<String>,
}

impl HeaderProbe {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// 자산이 선언한 매니페스트 다이제스트
    pub fn manifest_hash(&self) -> Option<&str> {
        self.get(MANIFEST_HASH_HEADER).filter(|v| !v.trim().is_empty())
    }
}

/// `probe_content` 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentProbe {
    pub status: u16,
    pub length: usize,
    /// JPEG이면 구조 검사 결과, 그 외 타입이면 본문이 비어 있지 않은지 여부
    pub well_formed: bool,
    /// `c2pa` 레이블 APP11 세그먼트 존재 여부
    pub has_claim: bool,
}

/// `probe_link_resolution` 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResolution {
    pub manifest_url: Option<String>,
    /// 0 = URL 미발견, -1 = 전송 계층 실패, 그 외 HTTP 상태
    pub manifest_fetch_status: i32,
    pub hash_alignment: bool,
    /// 마크업 폴백으로 링크를 찾았는지 여부
    pub html_link_fallback: bool,
}

impl LinkResolution {
    fn not_discovered(html_link_fallback: bool) -> Self {
        Self {
            manifest_url: None,
            manifest_fetch_status: 0,
            hash_alignment: false,
            html_link_fallback,
        }
    }

    /// 리포트 필드로 변환합니다.
    pub fn to_manifest_fetch(&self) -> ManifestFetch {
        ManifestFetch {
            status: self.manifest_fetch_status,
            hash_alignment: self.hash_alignment,
            url: self.manifest_url.clone().unwrap_or_default(),
        }
    }
}

// ─── 클라이언트 ────────────────────────────────────────────────────

/// 프로브 HTTP 클라이언트
///
/// `reqwest::Client`는 내부적으로 `Arc`이므로 복제 비용이 낮습니다.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    http: reqwest::Client,
    link_header: Regex,
    markup_link: Regex,
}

impl ProbeClient {
    /// 설정으로 클라이언트를 만듭니다.
    pub fn new(config: &ProbeConfig) -> Result<Self, EngineError> {
        let client_err = |reason: String| EngineError::Client { reason };

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| client_err(e.to_string()))?;
        let link_header = Regex::new(LINK_HEADER_PATTERN).map_err(|e| client_err(e.to_string()))?;
        let markup_link = Regex::new(MARKUP_LINK_PATTERN).map_err(|e| client_err(e.to_string()))?;

        Ok(Self {
            http,
            link_header,
            markup_link,
        })
    }

    /// HEAD 요청으로 헤더를 수집합니다. 성공이 아닌 상태는 에러입니다.
    pub async fn probe_headers(&self, url: &str) -> Result<HeaderProbe, ProbeError> {
        let response = self
            .http
            .head(url)
            .send()
            .await
            .map_err(|e| ProbeError::transport(url, &e))?;
        ensure_success(url, &response)?;

        let headers = snapshot(response.headers());
        let link_header_present = headers
            .get("link")
            .is_some_and(|link| link.contains(LINK_RELATION));

        Ok(HeaderProbe {
            link_header_present,
            x_c2_policy: headers.get("x-c2-policy").cloned(),
            content_type: headers.get("content-type").cloned().unwrap_or_default(),
            cache_control: headers.get("cache-control").cloned(),
            headers,
        })
    }

    /// 본문을 받아 무결성과 임베디드 클레임을 검사합니다.
    pub async fn probe_content(&self, url: &str) -> Result<ContentProbe, ProbeError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError::transport(url, &e))?;
        ensure_success(url, &response)?;

        let status = response.status().as_u16();
        let is_jpeg = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/jpeg"));
        let body = response
            .bytes()
            .await
            .map_err(|e| ProbeError::transport(url, &e))?;

        let inspection = jpeg::inspect(&body);
        Ok(ContentProbe {
            status,
            length: body.len(),
            well_formed: if is_jpeg {
                inspection.well_formed
            } else {
                !body.is_empty()
            },
            has_claim: inspection.has_claim,
        })
    }

    /// 발견 링크를 찾아 매니페스트를 조회합니다.
    ///
    /// 1. Link 헤더에서 발견 링크를 찾음
    /// 2. 없으면 본문을 받아 마크업 `<link rel="c2pa-manifest">`를 찾음
    /// 3. 찾으면 매니페스트를 받아, 기대 다이제스트가 있을 때만 대소문자 무시 비교
    ///
    /// 기대 다이제스트가 없으면 정렬된 것으로 간주합니다.
    /// 최초 HEAD 요청이 전송 계층에서 실패하면 에러입니다.
    pub async fn probe_link_resolution(
        &self,
        url: &str,
        expected_digest: Option<&str>,
    ) -> Result<LinkResolution, ProbeError> {
        let head = self
            .http
            .head(url)
            .send()
            .await
            .map_err(|e| ProbeError::transport(url, &e))?;

        let mut candidate = head
            .headers()
            .get_all(reqwest::header::LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| self.parse_link_header(v));

        let mut html_link_fallback = false;
        if candidate.is_none() {
            match self.fetch_markup_link(url).await {
                Ok(Some(found)) => {
                    candidate = Some(found);
                    html_link_fallback = true;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(%url, error = %e, "markup link fallback failed"),
            }
        }

        let Some(candidate) = candidate else {
            return Ok(LinkResolution::not_discovered(html_link_fallback));
        };

        let manifest_url = match url::Url::parse(url).and_then(|base| base.join(&candidate)) {
            Ok(resolved) => resolved.to_string(),
            Err(e) => {
                tracing::debug!(%candidate, error = %e, "unresolvable manifest link");
                return Ok(LinkResolution {
                    manifest_url: Some(candidate),
                    manifest_fetch_status: -1,
                    hash_alignment: false,
                    html_link_fallback,
                });
            }
        };

        Ok(self
            .fetch_manifest(manifest_url, expected_digest, html_link_fallback)
            .await)
    }

    async fn fetch_markup_link(&self, url: &str) -> Result<Option<String>, ProbeError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError::transport(url, &e))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ProbeError::transport(url, &e))?;
        Ok(self.parse_markup_link(&String::from_utf8_lossy(&body)))
    }

    async fn fetch_manifest(
        &self,
        manifest_url: String,
        expected_digest: Option<&str>,
        html_link_fallback: bool,
    ) -> LinkResolution {
        let transport_failure = |manifest_url: String| LinkResolution {
            manifest_url: Some(manifest_url),
            manifest_fetch_status: -1,
            hash_alignment: false,
            html_link_fallback,
        };

        let response = match self.http.get(&manifest_url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %manifest_url, error = %e, "manifest fetch transport failure");
                return transport_failure(manifest_url);
            }
        };

        let status = i32::from(response.status().as_u16());
        if !response.status().is_success() {
            return LinkResolution {
                manifest_url: Some(manifest_url),
                manifest_fetch_status: status,
                hash_alignment: false,
                html_link_fallback,
            };
        }

        let hash_alignment = match expected_digest {
            // 기대 다이제스트가 없으면 정렬된 것으로 간주
            None => true,
            Some(expected) => match response.bytes().await {
                Ok(body) => hex::encode(Sha256::digest(&body)).eq_ignore_ascii_case(expected.trim()),
                Err(e) => {
                    tracing::debug!(url = %manifest_url, error = %e, "manifest body read failed");
                    return transport_failure(manifest_url);
                }
            },
        };

        LinkResolution {
            manifest_url: Some(manifest_url),
            manifest_fetch_status: status,
            hash_alignment,
            html_link_fallback,
        }
    }

    /// Link 헤더 값에서 발견 링크 URL을 추출합니다.
    pub fn parse_link_header(&self, value: &str) -> Option<String> {
        self.link_header
            .captures(value)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned())
    }

    /// 마크업에서 발견 링크 URL을 추출합니다.
    pub fn parse_markup_link(&self, html: &str) -> Option<String> {
        self.markup_link
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned())
    }
}

fn ensure_success(url: &str, response: &reqwest::Response) -> Result<(), ProbeError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(ProbeError::Status {
        url: url.to_owned(),
        status: response.status().as_u16(),
        detail: response
            .headers()
            .get(TRANSFORM_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    })
}

/// 헤더를 소문자 키 맵으로 정규화합니다. 같은 이름이 여러 번 오면 `, `로 합칩니다.
fn snapshot(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}
