#![no_main]

use libfuzzer_sys::fuzz_target;
use release_manager::markers::{Marker, MarkerKind};

// Only parsing is fuzzed; evaluation would run CMD bodies through the shell.
fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(marker) = Marker::parse(body) {
        let tag = match marker.kind {
            MarkerKind::Env => "ENV",
            MarkerKind::Cmd => "CMD",
            MarkerKind::Func => "FUNC",
        };
        assert!(body.contains(tag));
        assert!(body.contains(&marker.key));
    }
});
