//! Survival 리포트
//!
//! 시나리오 결과를 집계하고 JSON/JUnit으로 출력하며 실행 판정을 내립니다.
//!
//! # 모듈 구성
//!
//! - [`aggregate`]: 결과 시퀀스 → 생존율, 실패 코드 히스토그램
//! - [`json`]: 구조화 레코드 출력 및 재검증
//! - [`junit`]: CI 테스트 스위트 출력
//! - [`outcome`]: 통과/실패/기대 불일치 판정

pub mod aggregate;
pub mod error;
pub mod json;
pub mod junit;
pub mod outcome;

pub use aggregate::{Statistics, SurvivalReport};
pub use error::ReportError;
pub use outcome::{ExpectationMismatch, RunOutcome};
