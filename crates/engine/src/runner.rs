//! 시나리오 러너
//!
//! 시나리오 하나에 대해 샌드박스 선택 → 프로브 → 분류를 수행하여
//! 정확히 하나의 [`ScenarioResult`]를 만듭니다.
//!
//! # 프로브 순서
//!
//! 1. `probe_headers` (edge_worker 시간)
//! 2. `probe_content` (origin 시간)
//! 3. `probe_link_resolution`, 기대 다이제스트는 `X-Manifest-Hash` (manifest_fetch 시간)
//!
//! 첫 번째 예외적 프로브 실패에서 시나리오를 멈추고 메시지를 `error`에 기록합니다.
//! 그래도 결과는 가장 구체적인 접근 실패 코드로 분류되며 매트릭스 실행은 계속됩니다.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use survival_core::matrix::{HostilePathMatrix, Scenario};
use survival_core::metrics as m;
use survival_core::types::{FailureCode, ManifestFetch, ScenarioResult, Timings};
use survival_sandbox::SandboxEndpoints;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::classifier::{Classification, classify};
use crate::error::{EngineError, ProbeError};
use crate::facts::ProbeFacts;
use crate::probe::ProbeClient;

/// 자산 요청 경로 접두어
const ASSET_PATH: &str = "/assets/";

/// 자산 확장자
const ASSET_EXTENSION: &str = ".jpg";

/// 시나리오 러너
///
/// 상태가 없으므로 `Arc`로 공유하여 여러 태스크에서 동시에 사용합니다.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    client: ProbeClient,
    endpoints: SandboxEndpoints,
}

impl ScenarioRunner {
    pub fn new(client: ProbeClient, endpoints: SandboxEndpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn endpoints(&self) -> &SandboxEndpoints {
        &self.endpoints
    }

    /// `<base>/assets/<id>.jpg[?transforms=<json>]`
    pub fn asset_url(&self, scenario: &Scenario) -> Result<String, EngineError> {
        let base = self
            .endpoints
            .get(scenario.sandbox)
            .ok_or_else(|| EngineError::MissingEndpoint {
                scenario_id: scenario.id.clone(),
                sandbox: scenario.sandbox.to_string(),
            })?;

        let mut url = format!("{base}{ASSET_PATH}{}{ASSET_EXTENSION}", scenario.id);
        if !scenario.transforms.is_empty() {
            let json = serde_json::to_string(&scenario.transforms).map_err(|e| EngineError::Task {
                reason: format!("cannot encode transforms of '{}': {e}", scenario.id),
            })?;
            url.push_str("?transforms=");
            url.extend(url::form_urlencoded::byte_serialize(json.as_bytes()));
        }
        Ok(url)
    }

    /// 시나리오 하나를 실행합니다. 프로브 실패는 결과에 담기며 에러로 반환되지 않습니다.
    pub async fn run_scenario(&self, scenario: &Scenario) -> Result<ScenarioResult, EngineError> {
        let url = self.asset_url(scenario)?;
        let sandbox = scenario.sandbox;
        let mut timings = Timings::default();

        tracing::debug!(scenario_id = %scenario.id, %sandbox, %url, "running scenario");

        let started = Instant::now();
        let headers = self.client.probe_headers(&url).await;
        timings.edge_worker = record_probe("headers", started);
        let headers = match headers {
            Ok(headers) => headers,
            Err(e) => {
                let snapshot = BTreeMap::new();
                return Ok(self.aborted(scenario, &e, snapshot, timings));
            }
        };

        let started = Instant::now();
        let content = self.client.probe_content(&url).await;
        timings.origin = record_probe("content", started);
        let content = match content {
            Ok(content) => content,
            Err(e) => {
                return Ok(self.aborted(scenario, &e, headers.headers, timings));
            }
        };

        let started = Instant::now();
        let link = self
            .client
            .probe_link_resolution(&url, headers.manifest_hash())
            .await;
        timings.manifest_fetch = record_probe("link_resolution", started);
        let link = match link {
            Ok(link) => link,
            Err(e) => {
                return Ok(self.aborted(scenario, &e, headers.headers, timings));
            }
        };

        if link.html_link_fallback {
            tracing::debug!(scenario_id = %scenario.id, "discovery link found via markup fallback");
        }

        let facts = ProbeFacts::observed(sandbox, &headers, &content, &link);
        let classification = classify(&facts);

        Ok(build_result(
            scenario,
            classification,
            headers.headers,
            link.to_manifest_fetch(),
            timings,
            None,
        ))
    }

    fn aborted(
        &self,
        scenario: &Scenario,
        err: &ProbeError,
        headers_snapshot: BTreeMap<String, String>,
        timings: Timings,
    ) -> ScenarioResult {
        tracing::warn!(scenario_id = %scenario.id, error = %err, "probe failed");
        metrics::counter!(
            m::SCENARIO_ERRORS_TOTAL,
            m::LABEL_SANDBOX => scenario.sandbox.as_str()
        )
        .increment(1);

        let facts = ProbeFacts::from_error(scenario.sandbox, err);
        build_result(
            scenario,
            classify(&facts),
            headers_snapshot,
            ManifestFetch::not_discovered(),
            timings,
            Some(err.to_string()),
        )
    }
}

fn build_result(
    scenario: &Scenario,
    classification: Classification,
    headers_snapshot: BTreeMap<String, String>,
    manifest_fetch: ManifestFetch,
    timings_ms: Timings,
    error: Option<String>,
) -> ScenarioResult {
    let Classification {
        failure_code,
        remote_survives,
        embed_survives,
    } = classification;

    metrics::counter!(
        m::SCENARIOS_TOTAL,
        m::LABEL_SANDBOX => scenario.sandbox.as_str(),
        m::LABEL_CODE => failure_code.as_str()
    )
    .increment(1);

    let result = ScenarioResult {
        scenario_id: scenario.id.clone(),
        sandbox: scenario.sandbox,
        remote_survives,
        embed_survives,
        headers_snapshot,
        manifest_fetch,
        timings_ms,
        failure_code,
        error,
    };

    if failure_code == FailureCode::Survived {
        tracing::debug!(%result, "scenario classified");
    } else {
        tracing::info!(%result, "scenario classified");
    }
    result
}

fn record_probe(probe: &'static str, started: Instant) -> u64 {
    let elapsed = started.elapsed();
    metrics::histogram!(m::PROBE_DURATION_SECONDS, m::LABEL_PROBE => probe)
        .record(elapsed.as_secs_f64());
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// 매트릭스 전체를 실행합니다.
///
/// 시나리오는 `concurrency`개까지 동시에 실행되고, 모든 태스크가 끝난 뒤
/// 매트릭스 순서로 정렬된 결과를 반환합니다.
/// 취소 토큰이 발동하면 실행 중인 태스크를 중단하고 [`EngineError::Cancelled`]를 반환합니다.
pub async fn run_matrix(
    runner: Arc<ScenarioRunner>,
    matrix: &HostilePathMatrix,
    concurrency: usize,
    cancel: CancellationToken,
) -> Result<Vec<ScenarioResult>, EngineError> {
    // 엔드포인트 누락은 시나리오 실패가 아니라 실행 전체의 문제
    for scenario in &matrix.scenarios {
        runner.asset_url(scenario)?;
    }

    let total = matrix.scenarios.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    tracing::info!(scenarios = total, concurrency, "running matrix");

    for (index, scenario) in matrix.scenarios.iter().cloned().enumerate() {
        let runner = Arc::clone(&runner);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            // 세마포어는 닫히지 않음
            let _permit = semaphore.acquire_owned().await.ok();
            (index, runner.run_scenario(&scenario).await)
        });
    }

    let mut slots: Vec<Option<ScenarioResult>> = (0..total).map(|_| None).collect();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tasks.abort_all();
                tracing::warn!(pending = tasks.len(), "matrix run cancelled");
                return Err(EngineError::Cancelled);
            }
            joined = tasks.join_next() => {
                let Some(joined) = joined else { break };
                let (index, result) = joined.map_err(|e| EngineError::Task { reason: e.to_string() })?;
                slots[index] = Some(result?);
            }
        }
    }

    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| EngineError::Task {
            reason: "scenario task finished without a result".to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use survival_core::config::ProbeConfig;
    use survival_core::matrix::{EmbedExpectation, ExpectedOutcome, ToolKind, Transform};
    use survival_core::types::SandboxKind;

    fn scenario(id: &str, sandbox: SandboxKind, transforms: Vec<Transform>) -> Scenario {
        Scenario {
            id: id.to_owned(),
            sandbox,
            transforms,
            expected: ExpectedOutcome {
                remote_survives: true,
                embed_survives: EmbedExpectation::Known(false),
                notes: None,
            },
            notes: None,
        }
    }

    fn runner() -> ScenarioRunner {
        let mut endpoints = SandboxEndpoints::new();
        endpoints.insert(SandboxKind::StripHappy, "http://127.0.0.1:4101");
        ScenarioRunner::new(ProbeClient::new(&ProbeConfig::default()).unwrap(), endpoints)
    }

    #[test]
    fn asset_url_without_transforms_has_no_query() {
        let url = runner()
            .asset_url(&scenario("plain", SandboxKind::StripHappy, Vec::new()))
            .unwrap();
        assert_eq!(url, "http://127.0.0.1:4101/assets/plain.jpg");
    }

    #[test]
    fn asset_url_carries_encoded_chain() {
        let chain = vec![Transform {
            tool: ToolKind::SimulateProxy,
            args: vec!["--poison-cache".to_owned()],
        }];
        let url = runner()
            .asset_url(&scenario("poison", SandboxKind::StripHappy, chain))
            .unwrap();
        let (_, query) = url.split_once("?transforms=").unwrap();
        let decoded: String = url::form_urlencoded::parse(format!("t={query}").as_bytes())
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(decoded, r#"[{"tool":"simulate-proxy","args":["--poison-cache"]}]"#);
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let err = runner()
            .asset_url(&scenario("x", SandboxKind::RemoteOnly, Vec::new()))
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingEndpoint { ref sandbox, .. } if sandbox == "remote-only"));
    }

    #[tokio::test]
    async fn unreachable_sandbox_is_inaccessible_timeout() {
        let mut endpoints = SandboxEndpoints::new();
        endpoints.insert(SandboxKind::StripHappy, "http://127.0.0.1:1");
        let runner = ScenarioRunner::new(ProbeClient::new(&ProbeConfig::default()).unwrap(), endpoints);

        let result = runner
            .run_scenario(&scenario("down", SandboxKind::StripHappy, Vec::new()))
            .await
            .unwrap();
        assert_eq!(result.failure_code, FailureCode::InaccessibleTimeout);
        assert!(!result.remote_survives);
        assert!(result.error.is_some());
        assert_eq!(result.manifest_fetch, ManifestFetch::not_discovered());
    }

    #[tokio::test]
    async fn cancelled_run_returns_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let matrix = HostilePathMatrix::parse(
            r#"
version: 1
scenarios:
  - id: a
    sandbox: strip-happy
    transforms: []
    expected: { remote_survives: true, embed_survives: false }
"#,
        )
        .unwrap();

        let err = run_matrix(Arc::new(runner()), &matrix, 2, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }
}
