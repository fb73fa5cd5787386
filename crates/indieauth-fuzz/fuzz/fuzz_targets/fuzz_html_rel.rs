#![no_main]

use indieauth_server::discovery::html;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(page) = std::str::from_utf8(data) else { return };

    let _ = html::rel_values(page, "indieauth-metadata");
    let _ = html::rel_values(page, "redirect_uri");
});
