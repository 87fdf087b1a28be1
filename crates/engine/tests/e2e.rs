//! 인프로세스 샌드박스를 대상으로 한 엔드투엔드 시나리오 테스트

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use survival_core::config::ProbeConfig;
use survival_core::matrix::{
    EmbedExpectation, ExpectedOutcome, HostilePathMatrix, Scenario, ToolKind, Transform,
};
use survival_core::types::{FailureCode, SandboxKind};
use survival_engine::{ProbeClient, ScenarioRunner, run_matrix};
use survival_sandbox::{InProcessSandbox, SandboxEndpoints, sha256_hex};
use survival_transform::MagickPipeline;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

struct Sandboxes {
    servers: Vec<InProcessSandbox>,
}

impl Sandboxes {
    async fn start() -> Self {
        let mut servers = Vec::new();
        for kind in SandboxKind::ALL {
            servers.push(
                InProcessSandbox::spawn(kind, MagickPipeline::new("/nonexistent/magick"))
                    .await
                    .unwrap(),
            );
        }
        Self { servers }
    }

    fn endpoints(&self) -> SandboxEndpoints {
        let mut endpoints = SandboxEndpoints::new();
        for server in &self.servers {
            endpoints.insert(server.kind(), server.base_url());
        }
        endpoints
    }

    fn runner(&self) -> ScenarioRunner {
        runner_for(self.endpoints())
    }
}

fn runner_for(endpoints: SandboxEndpoints) -> ScenarioRunner {
    let config = ProbeConfig {
        timeout_ms: 2000,
        ..ProbeConfig::default()
    };
    ScenarioRunner::new(ProbeClient::new(&config).unwrap(), endpoints)
}

fn scenario(id: &str, sandbox: SandboxKind, transforms: &[(ToolKind, &[&str])]) -> Scenario {
    Scenario {
        id: id.to_owned(),
        sandbox,
        transforms: transforms
            .iter()
            .map(|(tool, args)| Transform {
                tool: *tool,
                args: args.iter().map(|a| (*a).to_owned()).collect(),
            })
            .collect(),
        expected: ExpectedOutcome {
            remote_survives: true,
            embed_survives: EmbedExpectation::Known(false),
            notes: None,
        },
        notes: None,
    }
}

/// 라우터 하나를 임의 포트에 띄우는 스텁 오리진
struct StubOrigin {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl StubOrigin {
    async fn spawn(app: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await;
        });
        Self {
            addr,
            shutdown: Some(tx),
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for StubOrigin {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn healthy_asset_survives() {
    // Given: 변환 없는 preserve-embed 시나리오
    let sandboxes = Sandboxes::start().await;
    let runner = sandboxes.runner();

    // When
    let result = runner
        .run_scenario(&scenario("healthy", SandboxKind::PreserveEmbed, &[]))
        .await
        .unwrap();

    // Then
    assert_eq!(result.failure_code, FailureCode::Survived, "{result:?}");
    assert!(result.remote_survives);
    assert!(result.embed_survives);
    assert!(result.error.is_none());
    assert_eq!(result.manifest_fetch.status, 200);
    assert!(result.manifest_fetch.hash_alignment);
    assert!(result.manifest_fetch.url.contains("/manifests/"));
    assert_eq!(result.headers_snapshot["x-c2-policy"], "preserve-allowed");
}

#[tokio::test]
async fn poisoned_content_breaks_manifest() {
    let sandboxes = Sandboxes::start().await;
    let result = sandboxes
        .runner()
        .run_scenario(&scenario(
            "poison",
            SandboxKind::StripHappy,
            &[(ToolKind::SimulateProxy, &["--poison-cache"])],
        ))
        .await
        .unwrap();

    assert_eq!(result.failure_code, FailureCode::BrokenManifest);
    assert!(!result.remote_survives);
    assert!(!result.manifest_fetch.hash_alignment);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn dropped_link_is_broken_link() {
    let sandboxes = Sandboxes::start().await;
    let result = sandboxes
        .runner()
        .run_scenario(&scenario(
            "nolink",
            SandboxKind::RemoteOnly,
            &[(ToolKind::SimulateProxy, &["--drop-link-header"])],
        ))
        .await
        .unwrap();

    assert_eq!(result.failure_code, FailureCode::BrokenLink);
    assert_eq!(result.manifest_fetch.status, 0);
    assert!(result.manifest_fetch.url.is_empty());
}

#[tokio::test]
async fn forged_manifest_is_broken_manifest() {
    let sandboxes = Sandboxes::start().await;
    let result = sandboxes
        .runner()
        .run_scenario(&scenario(
            "forged",
            SandboxKind::RemoteOnly,
            &[(ToolKind::SimulateProxy, &["--fake-manifest"])],
        ))
        .await
        .unwrap();

    assert_eq!(result.failure_code, FailureCode::BrokenManifest);
    assert_eq!(result.manifest_fetch.status, 200);
}

#[tokio::test]
async fn stripped_policy_headers_are_broken_headers() {
    let sandboxes = Sandboxes::start().await;
    let result = sandboxes
        .runner()
        .run_scenario(&scenario(
            "headers",
            SandboxKind::RemoteOnly,
            &[(ToolKind::SimulateProxy, &["--strip-policy-headers"])],
        ))
        .await
        .unwrap();

    assert_eq!(result.failure_code, FailureCode::BrokenHeaders);
    assert!(!result.headers_snapshot.contains_key("x-c2-policy"));
}

#[tokio::test]
async fn strip_in_transit_destroys_embed() {
    let sandboxes = Sandboxes::start().await;
    let result = sandboxes
        .runner()
        .run_scenario(&scenario(
            "stripped",
            SandboxKind::PreserveEmbed,
            &[(ToolKind::Magick, &["-strip"])],
        ))
        .await
        .unwrap();

    assert_eq!(result.failure_code, FailureCode::DestroyedEmbed);
    assert!(!result.embed_survives);
}

#[tokio::test]
async fn truncated_body_is_destroyed_content() {
    let sandboxes = Sandboxes::start().await;
    let result = sandboxes
        .runner()
        .run_scenario(&scenario(
            "truncated",
            SandboxKind::RemoteOnly,
            &[(ToolKind::SimulateProxy, &["--truncate", "20"])],
        ))
        .await
        .unwrap();

    assert_eq!(result.failure_code, FailureCode::DestroyedContent);
}

#[tokio::test]
async fn sandbox_transform_failure_is_recorded() {
    // 외부 도구가 없는 magick 폴백은 샌드박스에서 500
    let sandboxes = Sandboxes::start().await;
    let result = sandboxes
        .runner()
        .run_scenario(&scenario(
            "resize",
            SandboxKind::StripHappy,
            &[(ToolKind::Magick, &["-resize", "50%"])],
        ))
        .await
        .unwrap();

    assert_eq!(result.failure_code, FailureCode::Inaccessible);
    let error = result.error.unwrap();
    assert!(error.contains("HTTP 500"), "{error}");
    assert!(error.contains("/nonexistent/magick"), "{error}");
}

#[tokio::test]
async fn asset_404_is_inaccessible_404() {
    let origin = StubOrigin::spawn(Router::new().route(
        "/assets/{file}",
        get(|| async { (StatusCode::NOT_FOUND, "missing") }),
    ))
    .await;
    let mut endpoints = SandboxEndpoints::new();
    endpoints.insert(SandboxKind::StripHappy, origin.base_url());

    let result = runner_for(endpoints)
        .run_scenario(&scenario("gone", SandboxKind::StripHappy, &[]))
        .await
        .unwrap();

    assert_eq!(result.failure_code, FailureCode::Inaccessible404);
    assert!(!result.remote_survives);
    assert!(result.error.is_some());
}

/// Link 헤더만 다르게 주는 자산 라우트
fn asset_with_link(link: &'static str) -> Router {
    Router::new().route(
        "/assets/{file}",
        get(move || async move {
            (
                [
                    ("content-type", "text/html"),
                    ("x-c2-policy", "remote-only"),
                    ("link", link),
                ],
                "<html></html>",
            )
        }),
    )
}

#[tokio::test]
async fn manifest_404_keeps_status_and_breaks_manifest() {
    // Given: 발견 링크는 있지만 매니페스트 라우트가 404
    let origin = StubOrigin::spawn(
        asset_with_link(r#"</manifests/deadbeef.c2pa>; rel="c2pa-manifest""#).route(
            "/manifests/{file}",
            get(|| async { (StatusCode::NOT_FOUND, "no manifest") }),
        ),
    )
    .await;
    let mut endpoints = SandboxEndpoints::new();
    endpoints.insert(SandboxKind::StripHappy, origin.base_url());

    // When
    let result = runner_for(endpoints)
        .run_scenario(&scenario("manifest-gone", SandboxKind::StripHappy, &[]))
        .await
        .unwrap();

    // Then: 실제 상태 코드가 보존됨
    assert_eq!(result.failure_code, FailureCode::BrokenManifest, "{result:?}");
    assert_eq!(result.manifest_fetch.status, 404);
    assert!(!result.manifest_fetch.hash_alignment);
    assert!(result.manifest_fetch.url.ends_with("/manifests/deadbeef.c2pa"));
    assert!(!result.remote_survives);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn unreachable_manifest_is_transport_failure() {
    // Given: 발견 링크가 연결할 수 없는 호스트를 가리킴
    let origin =
        StubOrigin::spawn(asset_with_link(r#"<http://127.0.0.1:1/m.c2pa>; rel="c2pa-manifest""#))
            .await;
    let mut endpoints = SandboxEndpoints::new();
    endpoints.insert(SandboxKind::StripHappy, origin.base_url());

    // When
    let result = runner_for(endpoints)
        .run_scenario(&scenario("manifest-down", SandboxKind::StripHappy, &[]))
        .await
        .unwrap();

    // Then: 상태 -1, 시나리오는 중단되지 않고 분류됨
    assert_eq!(result.failure_code, FailureCode::BrokenManifest, "{result:?}");
    assert_eq!(result.manifest_fetch.status, -1);
    assert_eq!(result.manifest_fetch.url, "http://127.0.0.1:1/m.c2pa");
    assert!(!result.remote_survives);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn no_link_anywhere_is_broken_link() {
    let origin = StubOrigin::spawn(Router::new().route(
        "/assets/{file}",
        get(|| async {
            (
                [("content-type", "text/html"), ("x-c2-policy", "remote-only")],
                "<html><head></head><body>nothing here</body></html>",
            )
        }),
    ))
    .await;
    let mut endpoints = SandboxEndpoints::new();
    endpoints.insert(SandboxKind::StripHappy, origin.base_url());

    let result = runner_for(endpoints)
        .run_scenario(&scenario("bare", SandboxKind::StripHappy, &[]))
        .await
        .unwrap();

    assert_eq!(result.failure_code, FailureCode::BrokenLink);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn markup_fallback_link_resolves() {
    const MANIFEST: &str = r#"{"claim":"stub"}"#;
    let hash = sha256_hex(MANIFEST.as_bytes());
    let page_hash = hash.clone();

    let origin = StubOrigin::spawn(
        Router::new()
            .route(
                "/assets/{file}",
                get(move || {
                    let hash = page_hash.clone();
                    async move {
                        (
                            [
                                ("content-type", "text/html".to_owned()),
                                ("x-c2-policy", "remote-only".to_owned()),
                                ("x-manifest-hash", hash.to_uppercase()),
                            ],
                            format!(
                                "<html><head><link rel=\"c2pa-manifest\" href=\"/manifests/{hash}.c2pa\"></head></html>"
                            ),
                        )
                    }
                }),
            )
            .route("/manifests/{file}", get(|| async { MANIFEST })),
    )
    .await;
    let mut endpoints = SandboxEndpoints::new();
    endpoints.insert(SandboxKind::StripHappy, origin.base_url());

    let result = runner_for(endpoints)
        .run_scenario(&scenario("fallback", SandboxKind::StripHappy, &[]))
        .await
        .unwrap();

    // 다이제스트 비교는 대소문자를 무시함
    assert_eq!(result.failure_code, FailureCode::Survived, "{result:?}");
    assert!(result.manifest_fetch.hash_alignment);
    assert!(result.manifest_fetch.url.ends_with(&format!("/manifests/{hash}.c2pa")));
}

#[tokio::test]
async fn sample_matrix_matches_declared_expectations() {
    // Given: 저장소의 샘플 매트릭스와 세 개의 인프로세스 샌드박스
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../matrices/hostile-paths.yaml");
    let matrix = HostilePathMatrix::load(path).await.unwrap();
    let sandboxes = Sandboxes::start().await;

    // When: 동시 실행
    let results = run_matrix(
        Arc::new(sandboxes.runner()),
        &matrix,
        3,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    // Then: 매트릭스 순서 유지, 선언된 기대값과 일치
    assert_eq!(results.len(), matrix.scenarios.len());
    for (scenario, result) in matrix.scenarios.iter().zip(&results) {
        assert_eq!(scenario.id, result.scenario_id);
        assert_eq!(scenario.sandbox, result.sandbox);
        assert_eq!(
            scenario.expected.remote_survives, result.remote_survives,
            "{result}"
        );
        assert!(
            scenario.expected.embed_survives.admits(result.embed_survives),
            "{result}"
        );
        assert!(result.error.is_none(), "{result}: {:?}", result.error);
    }
}
