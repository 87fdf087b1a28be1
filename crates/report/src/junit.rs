//! JUnit XML 리포트 출력
//!
//! 시나리오 하나가 테스트 케이스 하나입니다. `remote_survives`가 false이면 실패입니다.
//! 실패 메시지는 `error`가 있으면 그 값, 없으면 기대/실제 생존 여부를 담은 문장입니다.

use std::fmt::Write as _;
use std::path::Path;

use survival_core::types::ScenarioResult;

use crate::aggregate::SurvivalReport;
use crate::error::ReportError;
use crate::json::write_file;

/// 최상위 `<testsuites>` 이름
pub const SUITES_NAME: &str = "C2 Survival Matrix";

/// `<testsuite>` 이름
pub const SUITE_NAME: &str = "Survival Matrix";

/// 리포트를 JUnit XML 문자열로 렌더링합니다.
pub fn to_string(report: &SurvivalReport) -> Result<String, ReportError> {
    let mut xml = String::new();
    render(report, &mut xml).map_err(|e| ReportError::Serialize(e.to_string()))?;
    Ok(xml)
}

/// 리포트를 JUnit XML 파일로 씁니다.
pub async fn write(report: &SurvivalReport, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    let content = to_string(report)?;
    write_file(path, content.as_bytes()).await?;
    tracing::info!(path = %path.display(), failures = report.scenarios_failed(), "junit report written");
    Ok(())
}

fn render(report: &SurvivalReport, out: &mut String) -> std::fmt::Result {
    let total_secs: f64 = report.results().iter().map(case_seconds).sum();

    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        out,
        r#"<testsuites name="{}" tests="{}" failures="{}" timestamp="{}" time="{:.3}">"#,
        escape(SUITES_NAME),
        report.total_scenarios(),
        report.scenarios_failed(),
        escape(report.timestamp()),
        total_secs,
    )?;
    writeln!(
        out,
        r#"  <testsuite name="{}" tests="{}" failures="{}" errors="0" skipped="0" time="{:.3}">"#,
        escape(SUITE_NAME),
        report.total_scenarios(),
        report.scenarios_failed(),
        total_secs,
    )?;

    for result in report.results() {
        write_case(result, out)?;
    }

    writeln!(out, "  </testsuite>")?;
    writeln!(out, "</testsuites>")
}

fn write_case(result: &ScenarioResult, out: &mut String) -> std::fmt::Result {
    let open = format!(
        r#"    <testcase name="{}" classname="acceptance.{}" time="{:.3}""#,
        escape(&result.scenario_id),
        escape(result.sandbox.as_str()),
        case_seconds(result),
    );

    if result.remote_survives {
        return writeln!(out, "{open}/>");
    }

    let message = failure_message(result);
    writeln!(out, "{open}>")?;
    writeln!(
        out,
        r#"      <failure message="{}" type="{}"><![CDATA[{}]]></failure>"#,
        escape(&message),
        escape(result.failure_code.as_str()),
        cdata(&message),
    )?;
    writeln!(out, "    </testcase>")
}

/// 실패 메시지
pub fn failure_message(result: &ScenarioResult) -> String {
    match &result.error {
        Some(error) => error.clone(),
        None => format!(
            "Remote survival failed. Expected: true, Got: {}. Embed survival: {}",
            result.remote_survives, result.embed_survives
        ),
    }
}

fn case_seconds(result: &ScenarioResult) -> f64 {
    (result.timings_ms.origin + result.timings_ms.manifest_fetch) as f64 / 1000.0
}

/// XML 속성/텍스트 이스케이프
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // XML 1.0에서 허용되지 않는 제어 문자
            c if c.is_control() && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// CDATA 종료 시퀀스를 분할합니다.
fn cdata(raw: &str) -> String {
    raw.replace("]]>", "]]]]><![CDATA[>")
}
