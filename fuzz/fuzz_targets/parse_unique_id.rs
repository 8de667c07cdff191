#![no_main]

use libfuzzer_sys::fuzz_target;
use trellis_core::UniqueId;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        // Anything that parses must print back to an id that parses to the same value
        if let Ok(id) = UniqueId::parse(s) {
            let reparsed = UniqueId::parse(&id.to_string());
            assert_eq!(reparsed.as_ref(), Ok(&id));
            if let Some(parent) = id.parent() {
                assert!(parent.is_prefix_of(&id));
            }
        }
    }
});
