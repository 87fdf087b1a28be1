#![no_main]

use libfuzzer_sys::fuzz_target;
use survival_core::matrix::HostilePathMatrix;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(matrix) = HostilePathMatrix::parse(content) {
            // 파싱에 성공한 매트릭스는 항상 검증을 통과해야 함
            assert!(matrix.validate().is_ok());
        }
    }
});
