#![no_main]

use libfuzzer_sys::fuzz_target;
use survival_transform::jpeg;

fuzz_target!(|data: &[u8]| {
    let _ = jpeg::inspect(data);
    if let Ok(stripped) = jpeg::strip_metadata(data) {
        // 제거 결과에는 클레임이 남지 않고, 다시 제거해도 그대로여야 함
        assert!(!jpeg::inspect(&stripped).has_claim);
        if let Ok(again) = jpeg::strip_metadata(&stripped) {
            assert_eq!(again, stripped);
        }
    }
});
