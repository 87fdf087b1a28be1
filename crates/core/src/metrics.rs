//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않았으면 기록은 무시됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `survival_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 샌드박스 레이블 키 (strip-happy, preserve-embed, remote-only)
pub const LABEL_SANDBOX: &str = "sandbox";

/// 실패 분류 코드 레이블 키
pub const LABEL_CODE: &str = "code";

/// 프로브 종류 레이블 키 (headers, content, link_resolution)
pub const LABEL_PROBE: &str = "probe";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 엔진 메트릭 ───────────────────────────────────────────────────

/// 분류된 시나리오 수 (counter, labels: sandbox, code)
pub const SCENARIOS_TOTAL: &str = "survival_scenarios_total";

/// 예외로 끝난 시나리오 수 (counter, label: sandbox)
pub const SCENARIO_ERRORS_TOTAL: &str = "survival_scenario_errors_total";

/// 프로브 소요 시간 (histogram, 초, label: probe)
pub const PROBE_DURATION_SECONDS: &str = "survival_probe_duration_seconds";

// ─── 샌드박스 메트릭 ───────────────────────────────────────────────

/// 샌드박스 기동 시도 수 (counter, labels: sandbox, result)
pub const SANDBOX_STARTS_TOTAL: &str = "survival_sandbox_starts_total";

// ─── 리포트 메트릭 ─────────────────────────────────────────────────

/// 마지막 실행의 원격 생존율 (gauge)
pub const REMOTE_SURVIVAL_RATE: &str = "survival_remote_survival_rate";

/// 마지막 실행의 preserve-embed 임베드 생존율 (gauge)
pub const EMBED_SURVIVAL_RATE: &str = "survival_embed_survival_rate_preserve_only";

/// 프로브 소요 시간 히스토그램 버킷 (초)
pub const PROBE_DURATION_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        SCENARIOS_TOTAL,
        "Total number of classified scenarios by sandbox and failure code"
    );
    describe_counter!(
        SCENARIO_ERRORS_TOTAL,
        "Total number of scenarios that ended with an exceptional error"
    );
    describe_histogram!(
        PROBE_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Duration of individual delivery probes"
    );
    describe_counter!(
        SANDBOX_STARTS_TOTAL,
        "Total number of sandbox start attempts by result"
    );
    describe_gauge!(
        REMOTE_SURVIVAL_RATE,
        "Remote survival rate of the most recent run"
    );
    describe_gauge!(
        EMBED_SURVIVAL_RATE,
        "Embedded claim survival rate over preserve-embed scenarios of the most recent run"
    );
}
