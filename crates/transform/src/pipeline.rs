//! 변환 파이프라인 추상화 및 레지스트리
//!
//! 모든 [`ToolKind`]는 정확히 하나의 [`TransformPipeline`] 구현에 매핑됩니다.
//! 매핑은 닫힌 `match`이므로 도구를 추가하면 [`TransformRegistry`]에서 컴파일 에러로 드러납니다.
//!
//! # 구조
//!
//! ```text
//! ┌──────────────────────┐
//! │  TransformRegistry   │
//! └──────────┬───────────┘
//!            │ ToolKind
//!     ┌──────┼──────────────┐
//!     ▼      ▼              ▼
//! ┌──────┐ ┌──────────────┐ ┌──────┐
//! │Magick│ │SimulateProxy │ │ Copy │
//! └──┬───┘ └──────────────┘ └──────┘
//!    │ fallback
//!    ▼
//!  magick - <args> -
//! ```
//!
//! 파이프라인은 바이트만 만듭니다. 헤더 제거, ETag 재작성 같은 HTTP 계층 효과는
//! [`DeliveryEffect`] 값으로 기술되고 서빙하는 샌드박스가 적용합니다.

use std::future::Future;

use bytes::Bytes;
use survival_core::error::MatrixError;
use survival_core::matrix::{HostilePathMatrix, ToolKind, Transform};

use crate::error::TransformError;
use crate::magick::MagickPipeline;
use crate::proxy::ProxyPipeline;

/// 전달 경로 변환이 요청하는 HTTP 계층 변경
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEffect {
    /// 원본과 더 이상 일치하지 않는 `ETag`로 교체
    RewriteEtag,
    /// `Vary` 헤더에 토큰 추가
    AddVary(String),
    /// `Link: rel="c2pa-manifest"` 헤더 제거
    DropDiscoveryLink,
    /// `X-C2-Policy`, `X-Manifest-Hash` 제거
    StripPolicyHeaders,
    /// 발견 링크가 위조 매니페스트를 가리키도록 변경
    ForgeManifest,
    /// 매니페스트를 포함한 경로상의 모든 객체를 오염 센티널로 응답
    PoisonCache,
    /// `Content-Disposition: attachment; filename="..."` 설정
    ContentDisposition(String),
    /// `Content-Security-Policy` 설정
    SetCsp(String),
}

/// [`Transform::tool`]로 선택되는 변환
///
/// 구현체는 상태가 없고 `Send + Sync`이며, 인스턴스 하나가 모든 요청을 동시에 처리합니다.
pub trait TransformPipeline: Send + Sync + 'static {
    /// 이 파이프라인이 담당하는 도구
    fn kind(&self) -> ToolKind;

    /// 바이트를 건드리지 않고 인자 벡터만 검사합니다.
    ///
    /// 매트릭스 로드 시 변환마다 한 번 호출됩니다.
    fn validate_args(&self, args: &[String]) -> Result<(), TransformError>;

    /// 변환을 적용합니다.
    ///
    /// 같은 `(input, args)`에 대해 결정적입니다. 전달 효과 시뮬레이션 변환은
    /// 입력을 그대로 돌려주거나 고정 센티널을 반환합니다.
    fn apply(
        &self,
        input: Bytes,
        args: &[String],
    ) -> impl Future<Output = Result<Bytes, TransformError>> + Send;

    /// 이 인자에 대해 서빙 측이 적용해야 할 HTTP 계층 효과
    fn delivery_effects(&self, _args: &[String]) -> Result<Vec<DeliveryEffect>, TransformError> {
        Ok(Vec::new())
    }
}

/// 항등 변환
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyPipeline;

impl TransformPipeline for CopyPipeline {
    fn kind(&self) -> ToolKind {
        ToolKind::Copy
    }

    fn validate_args(&self, args: &[String]) -> Result<(), TransformError> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(TransformError::InvalidArgs {
                tool: ToolKind::Copy,
                reason: format!("copy takes no arguments, got {args:?}"),
            })
        }
    }

    async fn apply(&self, input: Bytes, _args: &[String]) -> Result<Bytes, TransformError> {
        Ok(input)
    }
}

/// [`ToolKind`]별 파이프라인 매핑
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    magick: MagickPipeline,
    proxy: ProxyPipeline,
    copy: CopyPipeline,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new(MagickPipeline::default())
    }
}

impl TransformRegistry {
    /// 주어진 콘텐츠 변환 백엔드로 레지스트리를 생성합니다.
    pub fn new(magick: MagickPipeline) -> Self {
        Self {
            magick,
            proxy: ProxyPipeline,
            copy: CopyPipeline,
        }
    }

    /// 변환 하나의 인자를 검증합니다.
    pub fn validate(&self, transform: &Transform) -> Result<(), TransformError> {
        match transform.tool {
            ToolKind::Magick => self.magick.validate_args(&transform.args),
            ToolKind::SimulateProxy => self.proxy.validate_args(&transform.args),
            ToolKind::Copy => self.copy.validate_args(&transform.args),
        }
    }

    /// 모든 시나리오의 모든 변환을 검증합니다.
    ///
    /// 에러에는 문제가 된 시나리오 ID가 포함됩니다.
    pub fn validate_matrix(&self, matrix: &HostilePathMatrix) -> Result<(), MatrixError> {
        for scenario in &matrix.scenarios {
            for transform in &scenario.transforms {
                self.validate(transform)
                    .map_err(|e| MatrixError::InvalidScenario {
                        scenario_id: scenario.id.clone(),
                        reason: e.to_string(),
                    })?;
            }
        }
        Ok(())
    }

    /// 변환 하나를 적용합니다.
    pub async fn apply(&self, transform: &Transform, input: Bytes) -> Result<Bytes, TransformError> {
        match transform.tool {
            ToolKind::Magick => self.magick.apply(input, &transform.args).await,
            ToolKind::SimulateProxy => self.proxy.apply(input, &transform.args).await,
            ToolKind::Copy => self.copy.apply(input, &transform.args).await,
        }
    }

    /// 체인을 왼쪽부터 적용합니다. 첫 실패에서 중단합니다.
    pub async fn apply_chain(
        &self,
        chain: &[Transform],
        input: Bytes,
    ) -> Result<Bytes, TransformError> {
        let mut bytes = input;
        for (step, transform) in chain.iter().enumerate() {
            bytes = self.apply(transform, bytes).await?;
            tracing::debug!(
                step,
                tool = %transform.tool,
                len = bytes.len(),
                "transform applied"
            );
        }
        Ok(bytes)
    }

    /// 체인의 HTTP 계층 효과를 순서대로 모읍니다.
    pub fn delivery_effects(&self, chain: &[Transform]) -> Result<Vec<DeliveryEffect>, TransformError> {
        let mut effects = Vec::new();
        for transform in chain {
            let step = match transform.tool {
                ToolKind::Magick => self.magick.delivery_effects(&transform.args)?,
                ToolKind::SimulateProxy => self.proxy.delivery_effects(&transform.args)?,
                ToolKind::Copy => self.copy.delivery_effects(&transform.args)?,
            };
            effects.extend(step);
        }
        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg;
    use crate::proxy::POISONED_CONTENT;

    fn transform(tool: ToolKind, args: &[&str]) -> Transform {
        Transform {
            tool,
            args: args.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[tokio::test]
    async fn copy_is_identity() {
        let registry = TransformRegistry::default();
        let input = Bytes::from_static(b"payload");
        let out = registry
            .apply(&transform(ToolKind::Copy, &[]), input.clone())
            .await
            .unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn chain_applies_left_to_right() {
        let registry = TransformRegistry::default();
        let input = Bytes::from(jpeg::tests::sample_jpeg(true));
        let chain = vec![
            transform(ToolKind::Magick, &["-strip"]),
            transform(ToolKind::SimulateProxy, &["--alter-etag"]),
            transform(ToolKind::Copy, &[]),
        ];
        let out = registry.apply_chain(&chain, input).await.unwrap();
        assert!(!jpeg::inspect(&out).has_claim);
        assert!(jpeg::inspect(&out).well_formed);
    }

    #[tokio::test]
    async fn poison_after_strip_yields_sentinel() {
        let registry = TransformRegistry::default();
        let chain = vec![
            transform(ToolKind::Magick, &["-strip"]),
            transform(ToolKind::SimulateProxy, &["--poison-cache"]),
        ];
        let out = registry
            .apply_chain(&chain, Bytes::from(jpeg::tests::sample_jpeg(false)))
            .await
            .unwrap();
        assert_eq!(out.as_ref(), POISONED_CONTENT);
    }

    #[test]
    fn delivery_effects_are_collected_in_order() {
        let registry = TransformRegistry::default();
        let chain = vec![
            transform(ToolKind::SimulateProxy, &["--drop-link-header"]),
            transform(ToolKind::Magick, &["-strip"]),
            transform(ToolKind::SimulateProxy, &["--add-csp", "default-src 'none'"]),
        ];
        let effects = registry.delivery_effects(&chain).unwrap();
        assert_eq!(
            effects,
            vec![
                DeliveryEffect::DropDiscoveryLink,
                DeliveryEffect::SetCsp("default-src 'none'".to_owned()),
            ]
        );
    }

    #[test]
    fn validate_matrix_names_scenario() {
        let yaml = r#"
version: 1
scenarios:
  - id: bad-quality
    sandbox: strip-happy
    transforms:
      - tool: simulate-proxy
        args: ["--recompress", "--quality", "high"]
    expected:
      remote_survives: true
      embed_survives: false
"#;
        let matrix = HostilePathMatrix::parse(yaml).unwrap();
        let err = TransformRegistry::default()
            .validate_matrix(&matrix)
            .unwrap_err();
        assert!(matches!(
            err,
            MatrixError::InvalidScenario { ref scenario_id, .. } if scenario_id == "bad-quality"
        ));
    }

    #[test]
    fn copy_rejects_arguments() {
        let registry = TransformRegistry::default();
        assert!(registry.validate(&transform(ToolKind::Copy, &[])).is_ok());
        assert!(
            registry
                .validate(&transform(ToolKind::Copy, &["--fast"]))
                .is_err()
        );
    }
}
