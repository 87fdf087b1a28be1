//! 전달 경로 변환 시뮬레이션 (`simulate-proxy`)
//!
//! 대부분의 플래그는 바이트를 바꾸지 않고 [`DeliveryEffect`]만 만듭니다.
//! 예외는 두 가지입니다.
//! - `--poison-cache`: 고정 센티널 [`POISONED_CONTENT`]를 반환하여 이후 다이제스트 비교가 반드시 실패
//! - `--truncate N`: 앞 N바이트만 남김 (손상된 전달 시뮬레이션)

use bytes::Bytes;
use survival_core::matrix::ToolKind;

use crate::error::TransformError;
use crate::pipeline::{DeliveryEffect, TransformPipeline};

/// 캐시 오염 시 반환되는 페이로드
pub const POISONED_CONTENT: &[u8] = b"poisoned-content";

/// 재압축 시뮬레이션 기본 품질
const DEFAULT_RECOMPRESS_QUALITY: u8 = 80;

/// 파싱된 플래그 집합
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyPlan {
    /// `--recompress` 지정 시 품질
    pub recompress_quality: Option<u8>,
    /// `--poison-cache`
    pub poison: bool,
    /// `--truncate N`
    pub truncate: Option<usize>,
    /// HTTP 계층 효과 (인자 순서)
    pub effects: Vec<DeliveryEffect>,
}

impl ProxyPlan {
    /// 인자 벡터를 파싱합니다. 알 수 없는 플래그는 에러입니다.
    pub fn parse(args: &[String]) -> Result<Self, TransformError> {
        let invalid = |reason: String| TransformError::InvalidArgs {
            tool: ToolKind::SimulateProxy,
            reason,
        };

        let mut plan = Self::default();
        let mut quality = None;
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .ok_or_else(|| invalid(format!("{flag} requires a value")))
            };

            match arg.as_str() {
                "--recompress" => plan.recompress_quality = Some(DEFAULT_RECOMPRESS_QUALITY),
                "--quality" => {
                    let raw = value("--quality")?;
                    match raw.parse::<u8>() {
                        Ok(q) if (1..=100).contains(&q) => quality = Some(q),
                        _ => return Err(invalid(format!("--quality must be 1..=100, got '{raw}'"))),
                    }
                }
                "--alter-etag" => plan.effects.push(DeliveryEffect::RewriteEtag),
                "--vary-ua" => plan
                    .effects
                    .push(DeliveryEffect::AddVary("User-Agent".to_owned())),
                "--drop-link-header" => plan.effects.push(DeliveryEffect::DropDiscoveryLink),
                "--strip-policy-headers" => plan.effects.push(DeliveryEffect::StripPolicyHeaders),
                "--poison-cache" => {
                    plan.poison = true;
                    plan.effects.push(DeliveryEffect::PoisonCache);
                }
                "--fake-manifest" => plan.effects.push(DeliveryEffect::ForgeManifest),
                "--rename-file" => {
                    let name = value("--rename-file")?;
                    if name.contains(['"', '/', '\\', '\r', '\n']) {
                        return Err(invalid(format!("invalid file name '{name}'")));
                    }
                    plan.effects.push(DeliveryEffect::ContentDisposition(name));
                }
                "--add-csp" => {
                    let csp = value("--add-csp")?;
                    if csp.contains(['\r', '\n']) {
                        return Err(invalid("CSP must be a single line".to_owned()));
                    }
                    plan.effects.push(DeliveryEffect::SetCsp(csp));
                }
                "--truncate" => {
                    let raw = value("--truncate")?;
                    let len = raw
                        .parse::<usize>()
                        .map_err(|_| invalid(format!("--truncate expects a byte count, got '{raw}'")))?;
                    plan.truncate = Some(len);
                }
                other => return Err(invalid(format!("unknown flag '{other}'"))),
            }
        }

        if let Some(q) = quality {
            if plan.recompress_quality.is_none() {
                return Err(invalid("--quality is only valid with --recompress".to_owned()));
            }
            plan.recompress_quality = Some(q);
        }

        Ok(plan)
    }
}

/// `simulate-proxy` 파이프라인
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyPipeline;

impl TransformPipeline for ProxyPipeline {
    fn kind(&self) -> ToolKind {
        ToolKind::SimulateProxy
    }

    fn validate_args(&self, args: &[String]) -> Result<(), TransformError> {
        ProxyPlan::parse(args).map(|_| ())
    }

    async fn apply(&self, input: Bytes, args: &[String]) -> Result<Bytes, TransformError> {
        let plan = ProxyPlan::parse(args)?;

        if let Some(quality) = plan.recompress_quality {
            tracing::debug!(quality, "simulating recompression");
        }

        if plan.poison {
            tracing::debug!("simulating cache poisoning");
            return Ok(Bytes::from_static(POISONED_CONTENT));
        }

        if let Some(len) = plan.truncate {
            return Ok(input.slice(..len.min(input.len())));
        }

        Ok(input)
    }

    fn delivery_effects(&self, args: &[String]) -> Result<Vec<DeliveryEffect>, TransformError> {
        Ok(ProxyPlan::parse(args)?.effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[tokio::test]
    async fn recompress_keeps_bytes() {
        let input = Bytes::from_static(b"\xFF\xD8jpeg");
        let out = ProxyPipeline
            .apply(input.clone(), &args(&["--recompress", "--quality", "40"]))
            .await
            .unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn poison_returns_sentinel() {
        let out = ProxyPipeline
            .apply(Bytes::from_static(b"original"), &args(&["--poison-cache"]))
            .await
            .unwrap();
        assert_eq!(out.as_ref(), POISONED_CONTENT);
    }

    #[tokio::test]
    async fn truncate_cuts_bytes() {
        let out = ProxyPipeline
            .apply(Bytes::from_static(b"0123456789"), &args(&["--truncate", "4"]))
            .await
            .unwrap();
        assert_eq!(out.as_ref(), b"0123");

        let out = ProxyPipeline
            .apply(Bytes::from_static(b"01"), &args(&["--truncate", "4"]))
            .await
            .unwrap();
        assert_eq!(out.as_ref(), b"01");
    }

    #[test]
    fn header_flags_become_effects() {
        let plan = ProxyPlan::parse(&args(&[
            "--alter-etag",
            "--vary-ua",
            "--rename-file",
            "renamed.jpg",
            "--fake-manifest",
        ]))
        .unwrap();
        assert_eq!(
            plan.effects,
            vec![
                DeliveryEffect::RewriteEtag,
                DeliveryEffect::AddVary("User-Agent".to_owned()),
                DeliveryEffect::ContentDisposition("renamed.jpg".to_owned()),
                DeliveryEffect::ForgeManifest,
            ]
        );
        assert!(!plan.poison);
    }

    #[test]
    fn recompress_quality_defaults_and_overrides() {
        let plan = ProxyPlan::parse(&args(&["--recompress"])).unwrap();
        assert_eq!(plan.recompress_quality, Some(80));
        let plan = ProxyPlan::parse(&args(&["--recompress", "--quality", "55"])).unwrap();
        assert_eq!(plan.recompress_quality, Some(55));
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        for bad in [
            vec!["--quality", "55"],
            vec!["--recompress", "--quality"],
            vec!["--recompress", "--quality", "101"],
            vec!["--rename-file"],
            vec!["--rename-file", "../x\"y"],
            vec!["--truncate", "-3"],
            vec!["--teleport"],
        ] {
            assert!(
                ProxyPlan::parse(&args(&bad)).is_err(),
                "expected {bad:?} to be rejected"
            );
        }
    }
}
