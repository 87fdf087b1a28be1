#![no_main]

use std::sync::LazyLock;

use libfuzzer_sys::fuzz_target;
use survival_core::config::ProbeConfig;
use survival_engine::ProbeClient;

static CLIENT: LazyLock<Option<ProbeClient>> =
    LazyLock::new(|| ProbeClient::new(&ProbeConfig::default()).ok());

fuzz_target!(|data: &[u8]| {
    let Some(client) = CLIENT.as_ref() else {
        return;
    };
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = client.parse_link_header(text);
        let _ = client.parse_markup_link(text);
    }
});
