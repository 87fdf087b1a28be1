//! Survival 매트릭스 실행 엔진
//!
//! 시나리오마다 샌드박스에 자산을 요청하고, 전달 표면을 프로브하고,
//! 관측 사실을 고정된 실패 분류 체계로 분류합니다.
//!
//! # 흐름
//!
//! ```text
//! Scenario ──▶ asset URL ──▶ probe_headers ──▶ probe_content ──▶ probe_link_resolution
//!                                                                      │
//!                                      ScenarioResult ◀── classify ◀── ProbeFacts
//! ```

pub mod classifier;
pub mod error;
pub mod facts;
pub mod probe;
pub mod runner;

pub use classifier::{Classification, classify};
pub use error::{EngineError, ProbeError};
pub use facts::{AssetAccess, ContentState, ManifestState, PolicyHeaders, ProbeFacts};
pub use probe::{ContentProbe, HeaderProbe, LinkResolution, ProbeClient};
pub use runner::{ScenarioRunner, run_matrix};
