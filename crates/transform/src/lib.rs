//! Survival 변환 파이프라인
//!
//! 시나리오의 `transforms` 체인을 바이트 버퍼에 적용하고,
//! 전달 계층 효과([`DeliveryEffect`])를 서빙 측에 알려줍니다.
//!
//! - [`MagickPipeline`]: 콘텐츠 변환 (네이티브 + 외부 도구 폴백)
//! - [`ProxyPipeline`]: 전달 경로 변환 시뮬레이션
//! - [`CopyPipeline`]: 항등 변환

pub mod error;
pub mod jpeg;
pub mod magick;
pub mod pipeline;
pub mod proxy;

pub use error::TransformError;
pub use magick::MagickPipeline;
pub use pipeline::{CopyPipeline, DeliveryEffect, TransformPipeline, TransformRegistry};
pub use proxy::{POISONED_CONTENT, ProxyPipeline, ProxyPlan};
