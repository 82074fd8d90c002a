use std::time::{Duration, SystemTime};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, ExchangeError};

/// Identifiers the token endpoint returns in the `client_info` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientInfo {
    pub uid: String,
    pub utid: String,
}

impl ClientInfo {
    pub fn decode(encoded: &str) -> Result<Self, Error> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| Error::ClientInfoDecoding {
                detail: e.to_string(),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| Error::ClientInfoDecoding {
            detail: e.to_string(),
        })
    }

    pub fn home_account_id(&self) -> String {
        format!("{}.{}", self.uid, self.utid)
    }
}

#[derive(Debug, Clone)]
pub struct OAuth2Tokens {
    data: serde_json::Value,
    received_at: SystemTime,
}

impl OAuth2Tokens {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            data,
            received_at: SystemTime::now(),
        }
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn access_token(&self) -> Result<&str, ExchangeError> {
        self.data["access_token"]
            .as_str()
            .ok_or(ExchangeError::MissingField {
                field: "access_token",
            })
    }

    pub fn access_token_expires_in_seconds(&self) -> Result<u64, ExchangeError> {
        self.data["expires_in"]
            .as_u64()
            .ok_or(ExchangeError::MissingField {
                field: "expires_in",
            })
    }

    pub fn access_token_expires_at(&self) -> Result<SystemTime, ExchangeError> {
        let expires_in = self.access_token_expires_in_seconds()?;
        self.received_at
            .checked_add(Duration::from_secs(expires_in))
            .ok_or(ExchangeError::MissingField {
                field: "expires_in",
            })
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.data["refresh_token"].as_str()
    }

    /// Granted scopes, if the server echoed them.
    pub fn scopes(&self) -> Option<Vec<String>> {
        let scope = self.data["scope"].as_str()?;
        Some(scope.split_whitespace().map(String::from).collect())
    }

    pub fn id_token(&self) -> Option<&str> {
        self.data["id_token"].as_str()
    }

    pub fn client_info(&self) -> Result<ClientInfo, Error> {
        match self.data["client_info"].as_str() {
            Some(encoded) if !encoded.is_empty() => ClientInfo::decode(encoded),
            _ => Err(Error::ClientInfoNotPopulated),
        }
    }
}
