//! PKCE (Proof Key for Code Exchange).
//!
//! Supports the `plain`, `MD5`, `S1`, `S256` and `S512` challenge methods.
//! Hashed methods encode the digest as base64url without padding everywhere;
//! comparisons that gate a grant are constant-time.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::error::PkceError;
use crate::random;

/// Minimum verifier length.
pub const VERIFIER_MIN_LEN: usize = 43;
/// Maximum verifier length.
pub const VERIFIER_MAX_LEN: usize = 128;
/// Length of generated verifiers.
const GENERATED_VERIFIER_LEN: usize = 64;

/// Challenge derivation method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    /// `challenge = verifier`.
    #[serde(rename = "plain")]
    Plain,
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "S1")]
    S1,
    #[default]
    #[serde(rename = "S256")]
    S256,
    #[serde(rename = "S512")]
    S512,
}

impl CodeChallengeMethod {
    pub const ALL: [Self; 5] = [Self::Plain, Self::Md5, Self::S1, Self::S256, Self::S512];

    /// Parse a method name case-insensitively; empty selects `S256`.
    pub fn parse(raw: &str) -> Result<Self, PkceError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| PkceError::UnsupportedMethod(raw.to_owned()))
    }

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Md5 => "MD5",
            Self::S1 => "S1",
            Self::S256 => "S256",
            Self::S512 => "S512",
        }
    }

    /// Derive the challenge for `verifier`.
    #[must_use]
    pub fn challenge(self, verifier: &str) -> String {
        let bytes = verifier.as_bytes();
        match self {
            Self::Plain => verifier.to_owned(),
            Self::Md5 => URL_SAFE_NO_PAD.encode(Md5::digest(bytes)),
            Self::S1 => URL_SAFE_NO_PAD.encode(Sha1::digest(bytes)),
            Self::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(bytes)),
            Self::S512 => URL_SAFE_NO_PAD.encode(Sha512::digest(bytes)),
        }
    }
}

impl std::fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CodeChallengeMethod {
    type Err = PkceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Check that a verifier has the RFC 7636 shape.
pub fn validate_verifier(verifier: &str) -> Result<(), PkceError> {
    let len = verifier.len();
    if !(VERIFIER_MIN_LEN..=VERIFIER_MAX_LEN).contains(&len) {
        return Err(PkceError::VerifierLength(len));
    }
    if !verifier.bytes().all(|b| random::UNRESERVED.contains(&b)) {
        return Err(PkceError::VerifierCharacters);
    }
    Ok(())
}

/// Constant-time string comparison.
fn ct_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// A full PKCE triple as held by the party that starts an authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkce {
    method: CodeChallengeMethod,
    verifier: String,
    challenge: String,
}

impl Pkce {
    /// Start a PKCE triple for `method` (case-insensitive, empty means `S256`).
    pub fn new(method: &str) -> Result<Self, PkceError> {
        Ok(Self {
            method: CodeChallengeMethod::parse(method)?,
            verifier: String::new(),
            challenge: String::new(),
        })
    }

    /// Use a caller-provided verifier instead of a generated one.
    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Result<Self, PkceError> {
        let verifier = verifier.into();
        validate_verifier(&verifier)?;
        self.verifier = verifier;
        self.challenge.clear();
        Ok(self)
    }

    /// Fill in a random verifier if none is set, then derive the challenge.
    pub fn generate(&mut self) {
        if self.verifier.is_empty() {
            self.verifier = random::string(GENERATED_VERIFIER_LEN, random::UNRESERVED);
        }
        self.challenge = self.method.challenge(&self.verifier);
    }

    /// Whether the stored challenge is exactly the one derived from the
    /// stored verifier.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.challenge.is_empty() || validate_verifier(&self.verifier).is_err() {
            return false;
        }
        ct_eq(&self.method.challenge(&self.verifier), &self.challenge)
    }

    #[must_use]
    pub const fn method(&self) -> CodeChallengeMethod {
        self.method
    }

    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Replace the challenge (as received from the other party).
    #[must_use]
    pub fn with_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.challenge = challenge.into();
        self
    }
}

/// The challenge half recorded with an authorization session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChallenge {
    #[serde(rename = "code_challenge")]
    pub challenge: String,
    #[serde(rename = "code_challenge_method")]
    pub method: CodeChallengeMethod,
}

impl CodeChallenge {
    /// Read the challenge fields of an authorization request.
    ///
    /// Both absent means the client does not use PKCE. A challenge without a
    /// method (or the reverse) is rejected rather than defaulted.
    pub fn from_request(
        challenge: Option<&str>,
        method: Option<&str>,
    ) -> Result<Option<Self>, PkceError> {
        let challenge = challenge.map(str::trim).filter(|c| !c.is_empty());
        let method = method.map(str::trim).filter(|m| !m.is_empty());

        match (challenge, method) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(PkceError::MissingMethod),
            (None, Some(_)) => Err(PkceError::MissingChallenge),
            (Some(challenge), Some(method)) => Ok(Some(Self {
                challenge: challenge.to_owned(),
                method: CodeChallengeMethod::parse(method)?,
            })),
        }
    }

    /// Check a presented verifier against this challenge.
    pub fn verify(&self, verifier: Option<&str>) -> Result<(), PkceError> {
        let verifier = verifier.filter(|v| !v.is_empty()).ok_or(PkceError::MissingVerifier)?;
        validate_verifier(verifier)?;

        if ct_eq(&self.method.challenge(verifier), &self.challenge) {
            Ok(())
        } else {
            Err(PkceError::Mismatch)
        }
    }
}
