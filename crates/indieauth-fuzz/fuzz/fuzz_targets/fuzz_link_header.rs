#![no_main]

use indieauth_server::discovery::link;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(header) = std::str::from_utf8(data) else { return };

    // Should never panic, only yield zero or more links
    for parsed in link::parse(header) {
        let _ = parsed.has_rel("authorization_endpoint");
    }
    let _ = link::targets([header, header], "token_endpoint");
});
