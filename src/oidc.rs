use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::Error;

/// `aud` is either a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::Single(aud) => aud == client_id,
            Self::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Payload {
    iss: String,
    sub: String,
    aud: Audience,
    exp: u64,
    iat: u64,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    tid: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Claims of a structurally valid ID token. Signatures are not verified;
/// the token is trusted because it arrived over the token endpoint's TLS
/// channel.
#[derive(Debug, Clone)]
pub struct IdTokenClaims {
    pub issuer: String,
    pub subject: String,
    pub audience: Audience,
    pub expires_at: u64,
    pub issued_at: u64,
    pub nonce: Option<String>,
    pub tenant_id: Option<String>,
    pub preferred_username: Option<String>,
    pub extra: serde_json::Map<String, serde_json::Value>,
    raw: String,
}

impl IdTokenClaims {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let value = decode_id_token(raw)?;
        let payload: Payload =
            serde_json::from_value(value).map_err(|e| Error::InvalidIdToken {
                detail: e.to_string(),
            })?;

        Ok(Self {
            issuer: payload.iss,
            subject: payload.sub,
            audience: payload.aud,
            expires_at: payload.exp,
            issued_at: payload.iat,
            nonce: payload.nonce,
            tenant_id: payload.tid,
            preferred_username: payload.preferred_username,
            extra: payload.extra,
            raw: raw.to_string(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The `header`, `payload` and `signature` segments as received.
    pub fn segments(&self) -> (&str, &str, &str) {
        let mut parts = self.raw.splitn(3, '.');
        let header = parts.next().unwrap_or_default();
        let payload = parts.next().unwrap_or_default();
        let signature = parts.next().unwrap_or_default();
        (header, payload, signature)
    }
}

fn split_segments(id_token: &str) -> Result<[&str; 3], Error> {
    let segments: Vec<&str> = id_token.split('.').collect();
    match segments.as_slice() {
        [header, payload, signature]
            if !payload.is_empty() && !id_token.chars().any(char::is_whitespace) =>
        {
            Ok([*header, *payload, *signature])
        }
        _ => Err(Error::TokenEncoding {
            detail: format!("expected 3 segments, found {}", segments.len()),
        }),
    }
}

/// Decode an ID token (JWT) and return the payload claims.
/// This does NOT verify the signature.
pub fn decode_id_token(id_token: &str) -> Result<serde_json::Value, Error> {
    if id_token.trim().is_empty() {
        return Err(Error::EmptyIdToken);
    }

    let [_, payload, _] = split_segments(id_token)?;

    // Strip any padding characters before decoding with URL_SAFE_NO_PAD
    let payload = payload.trim_end_matches('=');

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::IdTokenParsing {
            detail: e.to_string(),
        })?;

    let value: serde_json::Value =
        serde_json::from_slice(&decoded).map_err(|e| Error::IdTokenParsing {
            detail: e.to_string(),
        })?;

    if !value.is_object() {
        return Err(Error::InvalidIdToken {
            detail: "payload is not a JSON object".to_string(),
        });
    }

    Ok(value)
}
