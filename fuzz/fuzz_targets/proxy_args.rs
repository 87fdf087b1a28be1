#![no_main]

use libfuzzer_sys::fuzz_target;
use survival_transform::ProxyPlan;

fuzz_target!(|args: Vec<String>| {
    let _ = ProxyPlan::parse(&args);
});
