use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::TryRngCore as _;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// PKCE code challenge method (RFC 7636). Only the SHA-256 transform is
/// ever sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    S256,
}

impl CodeChallengeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
        }
    }
}

/// Verifier/challenge pair owned by exactly one in-flight request.
#[derive(Debug, Clone)]
pub struct PkceCodes {
    pub verifier: String,
    pub challenge: String,
    pub method: CodeChallengeMethod,
}

impl PkceCodes {
    /// 32 bytes from the OS entropy source, base64url-encoded without
    /// padding (43 chars), plus the derived S256 challenge.
    pub fn generate() -> Result<Self, Error> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::PkceGeneration {
                detail: e.to_string(),
            })?;

        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = create_code_challenge(&verifier);

        Ok(Self {
            verifier,
            challenge,
            method: CodeChallengeMethod::S256,
        })
    }
}

/// SHA-256 hash of the verifier, base64url-encoded without padding.
pub fn create_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
