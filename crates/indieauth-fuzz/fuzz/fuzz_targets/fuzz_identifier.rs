#![no_main]

use indieauth_server::models::{ClientId, Me};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else { return };

    // Anything accepted as a profile URL is also a valid client id
    if let Ok(me) = Me::parse(raw) {
        assert!(ClientId::parse(me.as_str()).is_ok());
    }
    if let Ok(client_id) = ClientId::parse(raw) {
        // Canonical form is stable
        assert!(ClientId::parse(client_id.as_str()).is_ok_and(|again| again == client_id));
    }
});
