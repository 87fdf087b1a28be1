//! JSON 리포트 출력
//!
//! 리포트를 그대로 직렬화합니다. 필드 이름은 다운스트림 도구가 의존하므로 고정입니다.

use std::path::Path;

use crate::aggregate::SurvivalReport;
use crate::error::ReportError;

/// 리포트를 들여쓰기된 JSON 문자열로 직렬화합니다.
pub fn to_string(report: &SurvivalReport) -> Result<String, ReportError> {
    serde_json::to_string_pretty(report).map_err(|e| ReportError::Serialize(e.to_string()))
}

/// JSON 문자열을 파싱하고 통계가 결과와 일치하는지 검사합니다.
pub fn from_str(text: &str) -> Result<SurvivalReport, ReportError> {
    let report: SurvivalReport =
        serde_json::from_str(text).map_err(|e| ReportError::Parse(e.to_string()))?;
    report.verify()?;
    Ok(report)
}

/// 리포트를 파일로 씁니다. 상위 디렉토리가 없으면 만듭니다.
pub async fn write(report: &SurvivalReport, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    let content = to_string(report)?;
    write_file(path, content.as_bytes()).await?;
    tracing::info!(path = %path.display(), scenarios = report.total_scenarios(), "json report written");
    Ok(())
}

/// 파일에서 리포트를 읽습니다.
pub async fn read(path: impl AsRef<Path>) -> Result<SurvivalReport, ReportError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ReportError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    from_str(&text)
}

pub(crate) async fn write_file(path: &Path, content: &[u8]) -> Result<(), ReportError> {
    let io_err = |e: std::io::Error| ReportError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, content).await.map_err(io_err)
}
