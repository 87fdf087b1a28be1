//! 콘텐츠 변환 파이프라인 (`magick`)
//!
//! 인자 조합이 모두 네이티브로 처리 가능하면 프로세스를 띄우지 않고 처리합니다.
//! - 빈 인자: 항등
//! - `-strip`: APP1..APP15, COM 세그먼트 제거
//! - `-interlace none`: 베이스라인 버퍼에 대해서는 항등
//!
//! 그 외 조합(`-resize`, `-quality`, `-crop`, 포맷 변환 등)은
//! `magick - <args...> -` 외부 프로세스로 넘깁니다. 실패는 그대로 전파됩니다.

use std::process::Stdio;

use bytes::Bytes;
use survival_core::matrix::ToolKind;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::TransformError;
use crate::jpeg;
use crate::pipeline::TransformPipeline;

/// 값을 요구하는 옵션
const VALUED_OPTIONS: &[&str] = &["-resize", "-quality", "-crop", "-gravity", "-interlace"];

/// stderr 요약 최대 길이
const STDERR_EXCERPT_LEN: usize = 200;

/// 네이티브로 처리할 수 있는 연산
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NativeOp {
    Strip,
    Baseline,
}

/// `magick` 파이프라인
#[derive(Debug, Clone)]
pub struct MagickPipeline {
    program: String,
}

impl Default for MagickPipeline {
    fn default() -> Self {
        Self::new("magick")
    }
}

impl MagickPipeline {
    /// 외부 도구 경로를 지정하여 생성합니다.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// 외부 도구 경로
    pub fn program(&self) -> &str {
        &self.program
    }

    /// 모든 인자가 네이티브 연산이면 연산 목록을 반환합니다.
    fn native_plan(args: &[String]) -> Option<Vec<NativeOp>> {
        let mut ops = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-strip" => ops.push(NativeOp::Strip),
                "-interlace" => match iter.next().map(String::as_str) {
                    Some(v) if v.eq_ignore_ascii_case("none") => ops.push(NativeOp::Baseline),
                    _ => return None,
                },
                _ => return None,
            }
        }
        Some(ops)
    }

    fn apply_native(input: Bytes, ops: &[NativeOp]) -> Result<Option<Bytes>, TransformError> {
        let mut bytes = input;
        for op in ops {
            match op {
                NativeOp::Strip => {
                    bytes = Bytes::from(jpeg::strip_metadata(&bytes)?);
                }
                NativeOp::Baseline => {
                    // 프로그레시브 재인코딩은 외부 도구 몫
                    if jpeg::inspect(&bytes).progressive {
                        return Ok(None);
                    }
                }
            }
        }
        Ok(Some(bytes))
    }

    async fn run_external(&self, input: Bytes, args: &[String]) -> Result<Bytes, TransformError> {
        tracing::debug!(program = %self.program, ?args, "delegating to external transform");

        let mut child = Command::new(&self.program)
            .arg("-")
            .args(args)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransformError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // 도구가 입력을 다 읽기 전에 종료하면 broken pipe가 나므로 종료 상태로 판단
            if let Err(e) = stdin.write_all(&input).await {
                tracing::debug!(error = %e, "external transform closed stdin early");
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TransformError::External {
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_LEN).collect();
            return Err(TransformError::External {
                reason: format!("{}: {excerpt}", output.status),
            });
        }

        if output.stdout.is_empty() {
            return Err(TransformError::External {
                reason: "empty output".to_owned(),
            });
        }

        Ok(Bytes::from(output.stdout))
    }
}

impl TransformPipeline for MagickPipeline {
    fn kind(&self) -> ToolKind {
        ToolKind::Magick
    }

    fn validate_args(&self, args: &[String]) -> Result<(), TransformError> {
        let invalid = |reason: String| TransformError::InvalidArgs {
            tool: ToolKind::Magick,
            reason,
        };

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg.is_empty() {
                return Err(invalid("empty argument".to_owned()));
            }
            if !VALUED_OPTIONS.contains(&arg.as_str()) {
                continue;
            }
            let Some(value) = iter.next() else {
                return Err(invalid(format!("{arg} requires a value")));
            };
            if arg == "-quality" {
                match value.parse::<u8>() {
                    Ok(q) if (1..=100).contains(&q) => {}
                    _ => return Err(invalid(format!("-quality must be 1..=100, got '{value}'"))),
                }
            }
        }
        Ok(())
    }

    async fn apply(&self, input: Bytes, args: &[String]) -> Result<Bytes, TransformError> {
        if args.is_empty() {
            return Ok(input);
        }

        if let Some(ops) = Self::native_plan(args)
            && let Some(out) = Self::apply_native(input.clone(), &ops)?
        {
            return Ok(out);
        }

        self.run_external(input, args).await
    }
}
