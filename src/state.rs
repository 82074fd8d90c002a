use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

use crate::error::Error;

/// Generate a cryptographically random correlation token.
/// 32 random bytes, base64url-encoded without padding.
pub fn issue_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// State and nonce bound to a single flow. Never reused.
#[derive(Debug, Clone)]
pub struct RequestCorrelation {
    pub state: String,
    pub nonce: String,
}

impl RequestCorrelation {
    pub fn issue() -> Self {
        Self {
            state: issue_token(),
            nonce: issue_token(),
        }
    }
}

pub fn validate_state(expected: &str, received: &str) -> Result<(), Error> {
    if expected.as_bytes() == received.as_bytes() {
        return Ok(());
    }
    Err(Error::InvalidState {
        received: received.to_string(),
        expected: expected.to_string(),
    })
}

pub fn validate_nonce(expected: &str, received: &str) -> Result<(), Error> {
    if expected.as_bytes() == received.as_bytes() {
        return Ok(());
    }
    Err(Error::NonceMismatch {
        received: received.to_string(),
        expected: expected.to_string(),
    })
}
