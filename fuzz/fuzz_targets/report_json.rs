#![no_main]

use libfuzzer_sys::fuzz_target;
use survival_report::json;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(report) = json::from_str(text) {
            // 검증을 통과한 리포트는 재직렬화 후에도 통과해야 함
            let encoded = json::to_string(&report).expect("verified report serializes");
            assert!(json::from_str(&encoded).is_ok());
        }
    }
});
