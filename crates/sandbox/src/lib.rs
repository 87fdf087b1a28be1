//! Survival 레퍼런스 샌드박스
//!
//! 전달 정책 변형마다 하나씩 존재하는 모의 오리진 서버와,
//! 그 프로세스들의 수명을 책임지는 관리자를 제공합니다.
//!
//! - [`registry`]: 정적 샌드박스 레지스트리 (이름, 포트, 종류)
//! - [`fixtures`]: 변형별 결정적 자산과 매니페스트
//! - [`server`]: axum 기반 샌드박스 HTTP 서버
//! - [`manager`]: `survival-sandboxd` 프로세스 그룹 관리

pub mod error;
pub mod fixtures;
pub mod manager;
pub mod registry;
pub mod server;

pub use error::SandboxError;
pub use fixtures::{Fixture, ForgedManifest, sha256_hex};
pub use manager::{SANDBOX_BINARY, SandboxManager};
pub use registry::{SandboxConfig, SandboxEndpoints, SandboxRegistry};
pub use server::{InProcessSandbox, SandboxState};
