#![no_main]

use libfuzzer_sys::fuzz_target;
use release_manager::{config, template};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(raw) = config::parse_document(text) else {
        return;
    };

    // Expansion either fails cleanly or yields a tree the typed loader can look at.
    if let Ok(expanded) = template::expand(&raw) {
        let _ = config::into_configuration(expanded.clone());

        // Documents without templates are fixed points.
        if !text.contains("{{") {
            assert_eq!(expanded, raw);
        }
    }
});
