#![no_main]

use indieauth_server::oauth::pkce::{CodeChallenge, CodeChallengeMethod, validate_verifier};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else { return };

    // Split into challenge, method and verifier on NUL
    let mut parts = raw.splitn(3, '\0');
    let challenge = parts.next();
    let method = parts.next();
    let verifier = parts.next();

    let _ = CodeChallengeMethod::parse(raw);
    if let Ok(Some(challenge)) = CodeChallenge::from_request(challenge, method) {
        let _ = challenge.verify(verifier);
    }

    if validate_verifier(raw).is_ok() {
        let challenge = CodeChallenge {
            challenge: CodeChallengeMethod::S256.challenge(raw),
            method: CodeChallengeMethod::S256,
        };
        assert!(challenge.verify(Some(raw)).is_ok());
    }
});
