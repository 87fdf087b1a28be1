//! 실행 결과 판정
//!
//! 리포트에서 실행 전체의 통과 여부를 결정합니다.
//! strict 모드에서는 시나리오의 `expected` 블록과 관측 결과를 비교하며,
//! 기대와 다른 결과가 하나라도 있으면 시나리오 실패보다 우선합니다.

use std::fmt;

use serde::Serialize;
use survival_core::matrix::HostilePathMatrix;

use crate::aggregate::SurvivalReport;

/// 기대와 다른 관측 결과 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectationMismatch {
    pub scenario_id: String,
    /// `remote_survives`, `embed_survives`, 또는 매트릭스에 없는 결과이면 `scenario_id`
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for ExpectationMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} expected {}, got {}",
            self.scenario_id, self.field, self.expected, self.actual
        )
    }
}

/// 실행 판정
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// 모든 시나리오 생존 (strict 모드에서는 기대와도 일치)
    Passed,
    /// 원격 생존에 실패한 시나리오가 있음
    ScenariosFailed { failed: usize },
    /// strict 모드에서 기대와 다른 결과가 있음
    ExpectationMismatch { mismatches: Vec<ExpectationMismatch> },
}

impl RunOutcome {
    /// 리포트를 판정합니다.
    pub fn evaluate(report: &SurvivalReport, matrix: &HostilePathMatrix, strict: bool) -> Self {
        if strict {
            let mismatches = mismatches(report, matrix);
            if !mismatches.is_empty() {
                return Self::ExpectationMismatch { mismatches };
            }
        }

        match report.scenarios_failed() {
            0 => Self::Passed,
            failed => Self::ScenariosFailed { failed },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// 결과별로 `expected` 블록과 비교합니다. `embed_survives: maybe`는 항상 일치합니다.
pub fn mismatches(report: &SurvivalReport, matrix: &HostilePathMatrix) -> Vec<ExpectationMismatch> {
    let mut out = Vec::new();

    for result in report.results() {
        let Some(scenario) = matrix.scenario(&result.scenario_id) else {
            out.push(ExpectationMismatch {
                scenario_id: result.scenario_id.clone(),
                field: "scenario_id".to_owned(),
                expected: "listed in matrix".to_owned(),
                actual: "absent".to_owned(),
            });
            continue;
        };
        let expected = &scenario.expected;

        if expected.remote_survives != result.remote_survives {
            out.push(ExpectationMismatch {
                scenario_id: result.scenario_id.clone(),
                field: "remote_survives".to_owned(),
                expected: expected.remote_survives.to_string(),
                actual: result.remote_survives.to_string(),
            });
        }
        if !expected.embed_survives.admits(result.embed_survives) {
            out.push(ExpectationMismatch {
                scenario_id: result.scenario_id.clone(),
                field: "embed_survives".to_owned(),
                expected: expected.embed_survives.to_string(),
                actual: result.embed_survives.to_string(),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::result;
    use survival_core::types::{FailureCode, SandboxKind};

    const MATRIX: &str = r#"
version: 1
scenarios:
  - id: strip-ok
    sandbox: strip-happy
    expected:
      remote_survives: true
      embed_survives: false
  - id: preserve-maybe
    sandbox: preserve-embed
    expected:
      remote_survives: true
      embed_survives: maybe
  - id: poisoned
    sandbox: remote-only
    transforms:
      - tool: simulate-proxy
        args: ["--poison-cache"]
    expected:
      remote_survives: false
      embed_survives: false
"#;

    fn matrix() -> HostilePathMatrix {
        HostilePathMatrix::parse(MATRIX).unwrap()
    }

    fn report(results: Vec<survival_core::ScenarioResult>) -> SurvivalReport {
        SurvivalReport::with_metadata("run-t", "2026-01-01T00:00:00Z", 1, results)
    }

    #[test]
    fn all_survived_passes() {
        let report = report(vec![
            result("strip-ok", SandboxKind::StripHappy, FailureCode::Survived, false),
            result("preserve-maybe", SandboxKind::PreserveEmbed, FailureCode::Survived, true),
        ]);
        assert_eq!(RunOutcome::evaluate(&report, &matrix(), false), RunOutcome::Passed);
        assert_eq!(RunOutcome::evaluate(&report, &matrix(), true), RunOutcome::Passed);
    }

    #[test]
    fn expected_failure_still_fails_the_run() {
        // Given: 기대대로 실패한 시나리오
        let report = report(vec![
            result("strip-ok", SandboxKind::StripHappy, FailureCode::Survived, false),
            result("poisoned", SandboxKind::RemoteOnly, FailureCode::BrokenManifest, false),
        ]);

        // When/Then: strict 모드에서도 불일치는 없으므로 시나리오 실패로 판정
        assert_eq!(
            RunOutcome::evaluate(&report, &matrix(), true),
            RunOutcome::ScenariosFailed { failed: 1 }
        );
    }

    #[test]
    fn strict_mismatch_takes_precedence() {
        let report = report(vec![
            result("strip-ok", SandboxKind::StripHappy, FailureCode::BrokenLink, false),
            result("poisoned", SandboxKind::RemoteOnly, FailureCode::BrokenManifest, false),
        ]);

        let outcome = RunOutcome::evaluate(&report, &matrix(), true);
        let RunOutcome::ExpectationMismatch { mismatches } = outcome else {
            panic!("expected mismatch, got {outcome:?}");
        };
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].scenario_id, "strip-ok");
        assert_eq!(mismatches[0].field, "remote_survives");
        assert_eq!(mismatches[0].to_string(), "strip-ok: remote_survives expected true, got false");

        // strict가 아니면 단순 실패
        assert_eq!(
            RunOutcome::evaluate(&report, &matrix(), false),
            RunOutcome::ScenariosFailed { failed: 2 }
        );
    }

    #[test]
    fn maybe_admits_either_embed_outcome() {
        for embed in [true, false] {
            let report = report(vec![result(
                "preserve-maybe",
                SandboxKind::PreserveEmbed,
                FailureCode::Survived,
                embed,
            )]);
            assert!(mismatches(&report, &matrix()).is_empty());
        }
    }

    #[test]
    fn embed_mismatch_is_reported() {
        let report = report(vec![result(
            "strip-ok",
            SandboxKind::StripHappy,
            FailureCode::Survived,
            true,
        )]);
        let found = mismatches(&report, &matrix());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "embed_survives");
        assert_eq!(found[0].expected, "false");
    }

    #[test]
    fn unknown_scenario_is_a_mismatch() {
        let report = report(vec![result("ghost", SandboxKind::StripHappy, FailureCode::Survived, false)]);
        let found = mismatches(&report, &matrix());
        assert_eq!(found[0].field, "scenario_id");
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let value = serde_json::to_value(RunOutcome::ScenariosFailed { failed: 2 }).unwrap();
        assert_eq!(value["outcome"], "scenarios_failed");
        assert_eq!(value["failed"], 2);
    }
}
