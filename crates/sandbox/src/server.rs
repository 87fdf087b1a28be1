//! 레퍼런스 샌드박스 HTTP 서버
//!
//! 변형 하나를 axum 라우터로 서빙합니다. 서버는 상태가 없으며
//! 시나리오별 동작(변환 체인)은 모두 `transforms` 쿼리로 전달됩니다.
//!
//! # 라우트
//!
//! | 경로 | 설명 |
//! |---|---|
//! | `GET /health` | `{"status":"healthy","sandbox":..,"port":..}` |
//! | `GET\|HEAD /assets/{filename}` | 변환 체인을 적용한 자산 + 정책 헤더 + 발견 링크 |
//! | `GET /manifests/{hash}.c2pa` | 매니페스트 문서 |
//! | `GET /assets-with-fallback/{filename}` | `<link rel="c2pa-manifest">`를 담은 HTML (Link 헤더 없음) |
//! | `GET /embed/{filename}` | `remote-only` 전용, 403 |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_SECURITY_POLICY, CONTENT_TYPE, ETAG, LINK, VARY,
    X_CONTENT_TYPE_OPTIONS,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use serde::Deserialize;
use survival_core::matrix::Transform;
use survival_core::types::SandboxKind;
use survival_transform::{DeliveryEffect, MagickPipeline, POISONED_CONTENT, TransformRegistry};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::SandboxError;
use crate::fixtures::{Fixture, ForgedManifest, sha256_hex};

// ─── 헤더 상수 ─────────────────────────────────────────────────────

/// 매니페스트 해시 헤더
pub const X_MANIFEST_HASH: &str = "x-manifest-hash";
/// 정책 선언 헤더
pub const X_C2_POLICY: &str = "x-c2-policy";
/// 샌드박스 내부 변환 실패 사유
pub const X_TRANSFORM_ERROR: &str = "x-transform-error";

/// `remote-only` 격리 CSP
pub const REMOTE_ONLY_CSP: &str = "default-src 'none'; img-src 'self' data:; frame-ancestors 'none'";

const ASSET_CACHE_CONTROL: &str = "public, max-age=3600";
const MANIFEST_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
const MANIFEST_CONTENT_TYPE: &str = "application/c2pa";
const MANIFEST_SUFFIX: &str = ".c2pa";

// ─── 상태 ──────────────────────────────────────────────────────────

/// 라우터 공유 상태 (읽기 전용)
#[derive(Debug)]
pub struct SandboxState {
    kind: SandboxKind,
    port: u16,
    fixture: Fixture,
    forged: ForgedManifest,
    transforms: TransformRegistry,
}

impl SandboxState {
    pub fn new(kind: SandboxKind, port: u16, magick: MagickPipeline) -> Self {
        Self {
            kind,
            port,
            fixture: Fixture::for_kind(kind),
            forged: ForgedManifest::default(),
            transforms: TransformRegistry::new(magick),
        }
    }

    pub fn kind(&self) -> SandboxKind {
        self.kind
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }
}

/// `?transforms=<json>` 쿼리
#[derive(Debug, Default, Deserialize)]
struct TransformQuery {
    transforms: Option<String>,
}

impl TransformQuery {
    fn chain(&self) -> Result<Vec<Transform>, String> {
        match self.transforms.as_deref() {
            None | Some("") => Ok(Vec::new()),
            Some(raw) => {
                serde_json::from_str(raw).map_err(|e| format!("invalid transforms query: {e}"))
            }
        }
    }

    /// 발견 링크에 그대로 실어 보낼 쿼리 문자열
    fn suffix(&self) -> String {
        match self.transforms.as_deref() {
            None | Some("") => String::new(),
            Some(raw) => {
                let encoded: String = url::form_urlencoded::byte_serialize(raw.as_bytes()).collect();
                format!("?transforms={encoded}")
            }
        }
    }
}

// ─── 라우터 ────────────────────────────────────────────────────────

/// 변형 하나의 라우터를 만듭니다.
pub fn router(state: Arc<SandboxState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/assets/{filename}", get(asset))
        .route("/manifests/{file}", get(manifest))
        .route("/assets-with-fallback/{filename}", get(asset_with_fallback));

    if state.kind == SandboxKind::RemoteOnly {
        router = router.route("/embed/{filename}", get(embed_blocked));
    }

    router.with_state(state)
}

/// 리스너에서 종료 신호가 올 때까지 서빙합니다.
pub async fn serve(
    listener: TcpListener,
    state: Arc<SandboxState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), SandboxError> {
    let kind = state.kind;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SandboxError::Serve {
            sandbox: kind.to_string(),
            reason: e.to_string(),
        })
}

// ─── 핸들러 ────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<SandboxState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "sandbox": state.kind,
        "port": state.port,
    }))
}

async fn asset(
    State(state): State<Arc<SandboxState>>,
    Path(filename): Path<String>,
    Query(query): Query<TransformQuery>,
) -> Response {
    let chain = match query.chain() {
        Ok(chain) => chain,
        Err(reason) => return error_response(StatusCode::BAD_REQUEST, &reason),
    };
    if let Err(e) = chain.iter().try_for_each(|t| state.transforms.validate(t)) {
        return error_response(StatusCode::BAD_REQUEST, &e.to_string());
    }
    let effects = match state.transforms.delivery_effects(&chain) {
        Ok(effects) => effects,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let body = match state
        .transforms
        .apply_chain(&chain, state.fixture.asset.clone())
        .await
    {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(sandbox = %state.kind, %filename, error = %e, "transform failed");
            return transform_failure(&e.to_string());
        }
    };

    let headers = match asset_headers(&state, &body, &effects, &query.suffix()) {
        Ok(headers) => headers,
        Err(reason) => return error_response(StatusCode::BAD_REQUEST, &reason),
    };

    tracing::debug!(
        sandbox = %state.kind,
        %filename,
        steps = chain.len(),
        len = body.len(),
        "asset served"
    );

    (StatusCode::OK, headers, body).into_response()
}

fn asset_headers(
    state: &SandboxState,
    body: &Bytes,
    effects: &[DeliveryEffect],
    query_suffix: &str,
) -> Result<HeaderMap, String> {
    let fixture = &state.fixture;
    let digest = sha256_hex(body);
    let mut etag = format!("\"{}\"", &digest[..16]);
    let mut manifest_hash = fixture.manifest_hash.as_str();
    let mut link = true;
    let mut policy_headers = true;
    let mut vary = Vec::new();
    let mut disposition = None;
    let mut csp = state
        .kind
        .requires_isolation_headers()
        .then(|| REMOTE_ONLY_CSP.to_owned());

    for effect in effects {
        match effect {
            DeliveryEffect::RewriteEtag => {
                etag = format!("\"{}\"", &sha256_hex(etag.as_bytes())[..16]);
            }
            DeliveryEffect::AddVary(token) => vary.push(token.clone()),
            DeliveryEffect::DropDiscoveryLink => link = false,
            DeliveryEffect::StripPolicyHeaders => policy_headers = false,
            DeliveryEffect::ForgeManifest => manifest_hash = state.forged.hash.as_str(),
            // 바이트는 변환 체인이 이미 센티널로 바꿈
            DeliveryEffect::PoisonCache => {}
            DeliveryEffect::ContentDisposition(name) => disposition = Some(name.clone()),
            DeliveryEffect::SetCsp(value) => csp = Some(value.clone()),
        }
    }

    let mut headers = HeaderMap::new();
    put(&mut headers, CONTENT_TYPE, "image/jpeg")?;
    put(&mut headers, CACHE_CONTROL, ASSET_CACHE_CONTROL)?;
    put(&mut headers, ETAG, &etag)?;

    if policy_headers {
        // X-Manifest-Hash는 항상 정품 해시를 가리킴
        put(
            &mut headers,
            HeaderName::from_static(X_MANIFEST_HASH),
            &fixture.manifest_hash,
        )?;
        put(
            &mut headers,
            HeaderName::from_static(X_C2_POLICY),
            state.kind.declared_policy(),
        )?;
    }
    if link {
        let value = format!(
            "</manifests/{manifest_hash}{MANIFEST_SUFFIX}{query_suffix}>; rel=\"c2pa-manifest\""
        );
        put(&mut headers, LINK, &value)?;
    }
    if let Some(csp) = csp {
        put(&mut headers, CONTENT_SECURITY_POLICY, &csp)?;
    }
    if state.kind.requires_isolation_headers() {
        put(&mut headers, X_CONTENT_TYPE_OPTIONS, "nosniff")?;
    }
    if !vary.is_empty() {
        put(&mut headers, VARY, &vary.join(", "))?;
    }
    if let Some(name) = disposition {
        put(
            &mut headers,
            CONTENT_DISPOSITION,
            &format!("attachment; filename=\"{name}\""),
        )?;
    }

    Ok(headers)
}

async fn manifest(
    State(state): State<Arc<SandboxState>>,
    Path(file): Path<String>,
    Query(query): Query<TransformQuery>,
) -> Response {
    let Some(hash) = file.strip_suffix(MANIFEST_SUFFIX) else {
        return error_response(StatusCode::NOT_FOUND, "Manifest not found");
    };
    let effects = match query
        .chain()
        .and_then(|chain| state.transforms.delivery_effects(&chain).map_err(|e| e.to_string()))
    {
        Ok(effects) => effects,
        Err(reason) => return error_response(StatusCode::BAD_REQUEST, &reason),
    };

    let body = if effects.contains(&DeliveryEffect::PoisonCache) {
        Bytes::from_static(POISONED_CONTENT)
    } else if hash.eq_ignore_ascii_case(&state.fixture.manifest_hash) {
        state.fixture.manifest.clone()
    } else if hash.eq_ignore_ascii_case(&state.forged.hash) {
        state.forged.body.clone()
    } else {
        return error_response(StatusCode::NOT_FOUND, "Manifest not found");
    };

    let mut headers = HeaderMap::new();
    let disposition = format!("inline; filename=\"{hash}{MANIFEST_SUFFIX}\"");
    let filled = put(&mut headers, CONTENT_TYPE, MANIFEST_CONTENT_TYPE)
        .and_then(|()| put(&mut headers, CACHE_CONTROL, MANIFEST_CACHE_CONTROL))
        .and_then(|()| put(&mut headers, CONTENT_DISPOSITION, &disposition));
    if let Err(reason) = filled {
        return error_response(StatusCode::BAD_REQUEST, &reason);
    }

    (StatusCode::OK, headers, body).into_response()
}

async fn asset_with_fallback(
    State(state): State<Arc<SandboxState>>,
    Path(filename): Path<String>,
) -> Response {
    let name = escape_html(&filename);
    let page = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>{name}</title>\n\
         <link rel=\"c2pa-manifest\" href=\"/manifests/{hash}{MANIFEST_SUFFIX}\">\n\
         </head>\n<body>\n<img src=\"/assets/{name}\" alt=\"{name}\">\n</body>\n</html>\n",
        hash = state.fixture.manifest_hash,
    );

    let mut headers = HeaderMap::new();
    let filled = put(&mut headers, CONTENT_TYPE, "text/html; charset=utf-8").and_then(|()| {
        put(
            &mut headers,
            HeaderName::from_static(X_C2_POLICY),
            state.kind.declared_policy(),
        )
    });
    if let Err(reason) = filled {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &reason);
    }

    (StatusCode::OK, headers, page).into_response()
}

async fn embed_blocked() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({
            "error": "Embedded content access blocked by remote-only policy",
            "policy": "remote-only",
        })),
    )
        .into_response()
}

// ─── 응답 헬퍼 ─────────────────────────────────────────────────────

fn put(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<(), String> {
    let value =
        HeaderValue::from_str(value).map_err(|e| format!("invalid value for {name}: {e}"))?;
    headers.insert(name, value);
    Ok(())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn transform_failure(message: &str) -> Response {
    // 헤더에 실을 수 없는 문자는 공백으로
    let sanitized: String = message
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { ' ' })
        .collect();
    let mut response = error_response(StatusCode::INTERNAL_SERVER_ERROR, message);
    if let Ok(value) = HeaderValue::from_str(&sanitized) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(X_TRANSFORM_ERROR), value);
    }
    response
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ─── 인프로세스 서버 ───────────────────────────────────────────────

/// 현재 런타임에서 실행되는 샌드박스 서버 핸들
///
/// 드롭 시 서버를 종료합니다. 통합 테스트와 단일 프로세스 실행에 사용합니다.
pub struct InProcessSandbox {
    kind: SandboxKind,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl InProcessSandbox {
    /// `127.0.0.1:0`에 바인딩하여 서버를 띄웁니다.
    pub async fn spawn(kind: SandboxKind, magick: MagickPipeline) -> Result<Self, SandboxError> {
        Self::spawn_on("127.0.0.1:0", kind, magick).await
    }

    /// 지정한 주소에 바인딩하여 서버를 띄웁니다.
    pub async fn spawn_on(
        addr: &str,
        kind: SandboxKind,
        magick: MagickPipeline,
    ) -> Result<Self, SandboxError> {
        let bind_err = |e: std::io::Error| SandboxError::Bind {
            addr: addr.to_owned(),
            reason: e.to_string(),
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
        let local = listener.local_addr().map_err(bind_err)?;

        let state = Arc::new(SandboxState::new(kind, local.port(), magick));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = serve(listener, state, shutdown).await {
                tracing::error!(sandbox = %kind, error = %e, "in-process sandbox stopped with error");
            }
        });

        tracing::debug!(sandbox = %kind, addr = %local, "in-process sandbox listening");

        Ok(Self {
            kind,
            addr: local,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        })
    }

    pub fn kind(&self) -> SandboxKind {
        self.kind
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://127.0.0.1:<port>`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// 서버를 종료하고 태스크가 끝날 때까지 기다립니다.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for InProcessSandbox {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
