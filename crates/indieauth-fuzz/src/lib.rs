//! Fuzzing library for indieauth-server.
//!
//! Targets cover everything that parses attacker-controlled input before
//! authentication: profile and client identifiers, PKCE parameters, `Link`
//! headers and HTML pages fetched during discovery.
//!
//! # Usage
//!
//! ```bash
//! cd crates/indieauth-fuzz
//! cargo +nightly fuzz run fuzz_link_header -- -max_total_time=60
//! ```

pub use indieauth_server::{discovery, models, oauth};
