//! 리포트 집계
//!
//! 파생 필드(생존율, 실패 수, 코드별 히스토그램)는 결과 시퀀스의 순수 함수입니다.
//! [`SurvivalReport`]는 필드를 외부에서 바꿀 수 없고, 생성 시 항상 결과에서 재계산합니다.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use survival_core::metrics as m;
use survival_core::types::{FailureCode, SandboxKind, ScenarioResult};

use crate::error::ReportError;

/// 결과 시퀀스에서 계산한 통계
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub total_scenarios: usize,
    pub remote_survival_rate: f64,
    pub embed_survival_rate_preserve_only: f64,
    pub scenarios_failed: usize,
    /// 아홉 개 코드 전부, 없는 코드는 0
    pub failure_breakdown: BTreeMap<FailureCode, usize>,
}

impl Statistics {
    /// 결과를 접어 통계를 계산합니다. 분모가 0이면 비율은 0입니다.
    pub fn from_results(results: &[ScenarioResult]) -> Self {
        let total = results.len();
        let survived = results.iter().filter(|r| r.remote_survives).count();

        let preserve: Vec<&ScenarioResult> = results
            .iter()
            .filter(|r| r.sandbox == SandboxKind::PreserveEmbed)
            .collect();
        let embed_survived = preserve.iter().filter(|r| r.embed_survives).count();

        let mut failure_breakdown: BTreeMap<FailureCode, usize> =
            FailureCode::ALL.into_iter().map(|code| (code, 0)).collect();
        for result in results {
            *failure_breakdown.entry(result.failure_code).or_insert(0) += 1;
        }

        Self {
            total_scenarios: total,
            remote_survival_rate: ratio(survived, total),
            embed_survival_rate_preserve_only: ratio(embed_survived, preserve.len()),
            scenarios_failed: total - survived,
            failure_breakdown,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// 텍스트 왕복 시 마지막 자리 오차 허용
fn rate_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= RATE_EPSILON
}

const RATE_EPSILON: f64 = 1e-9;

/// 실행 하나의 리포트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalReport {
    run_id: String,
    timestamp: String,
    matrix_version: u32,
    total_scenarios: usize,
    remote_survival_rate: f64,
    embed_survival_rate_preserve_only: f64,
    scenarios_failed: usize,
    failure_breakdown: BTreeMap<FailureCode, usize>,
    results: Vec<ScenarioResult>,
}

impl SurvivalReport {
    /// 새 `run_id`와 현재 시각으로 리포트를 만듭니다.
    pub fn new(matrix_version: u32, results: Vec<ScenarioResult>) -> Self {
        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        Self::with_metadata(run_id, timestamp, matrix_version, results)
    }

    /// 메타데이터를 지정하여 리포트를 만듭니다.
    pub fn with_metadata(
        run_id: impl Into<String>,
        timestamp: impl Into<String>,
        matrix_version: u32,
        results: Vec<ScenarioResult>,
    ) -> Self {
        let stats = Statistics::from_results(&results);
        Self {
            run_id: run_id.into(),
            timestamp: timestamp.into(),
            matrix_version,
            total_scenarios: stats.total_scenarios,
            remote_survival_rate: stats.remote_survival_rate,
            embed_survival_rate_preserve_only: stats.embed_survival_rate_preserve_only,
            scenarios_failed: stats.scenarios_failed,
            failure_breakdown: stats.failure_breakdown,
            results,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn matrix_version(&self) -> u32 {
        self.matrix_version
    }

    pub fn total_scenarios(&self) -> usize {
        self.total_scenarios
    }

    pub fn remote_survival_rate(&self) -> f64 {
        self.remote_survival_rate
    }

    pub fn embed_survival_rate_preserve_only(&self) -> f64 {
        self.embed_survival_rate_preserve_only
    }

    pub fn scenarios_failed(&self) -> usize {
        self.scenarios_failed
    }

    pub fn failure_breakdown(&self) -> &BTreeMap<FailureCode, usize> {
        &self.failure_breakdown
    }

    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    /// 모든 시나리오가 원격으로 살아남았는지 여부
    pub fn passed(&self) -> bool {
        self.scenarios_failed == 0
    }

    /// 기록된 통계가 결과에서 재계산한 값과 같은지 검사합니다.
    ///
    /// 외부에서 읽어들인 리포트에만 의미가 있습니다.
    pub fn verify(&self) -> Result<(), ReportError> {
        let stats = Statistics::from_results(&self.results);
        let drift = |field: &str| ReportError::Drift {
            field: field.to_owned(),
        };

        if stats.total_scenarios != self.total_scenarios {
            return Err(drift("total_scenarios"));
        }
        if !rate_eq(stats.remote_survival_rate, self.remote_survival_rate) {
            return Err(drift("remote_survival_rate"));
        }
        if !rate_eq(
            stats.embed_survival_rate_preserve_only,
            self.embed_survival_rate_preserve_only,
        ) {
            return Err(drift("embed_survival_rate_preserve_only"));
        }
        if stats.scenarios_failed != self.scenarios_failed {
            return Err(drift("scenarios_failed"));
        }
        if stats.failure_breakdown != self.failure_breakdown {
            return Err(drift("failure_breakdown"));
        }
        Ok(())
    }

    /// 생존율 게이지를 기록합니다. 레코더가 없으면 무시됩니다.
    pub fn record_gauges(&self) {
        metrics::gauge!(m::REMOTE_SURVIVAL_RATE).set(self.remote_survival_rate);
        metrics::gauge!(m::EMBED_SURVIVAL_RATE).set(self.embed_survival_rate_preserve_only);
    }
}
