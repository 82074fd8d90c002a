//! Client configuration.
//!
//! Can be built in code with [`ClientConfig::new`] or deserialized from JSON
//! with [`ClientConfig::from_json`]. Missing optional fields take the
//! defaults below.

use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// Settings for one [`AuthClient`](crate::AuthClient) instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,

    /// Confidential clients send this via HTTP Basic auth at the token
    /// endpoint. Public clients leave it unset.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Authority used when a flow does not name one and the cache does not
    /// decide it.
    pub authority: String,

    pub redirect_uri: String,

    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,

    /// Reject authority types that cannot be validated automatically.
    #[serde(default = "default_validate_authority")]
    pub validate_authority: bool,

    /// How long an interactive flow waits for its callback.
    #[serde(default = "default_callback_timeout_ms")]
    pub callback_timeout_ms: u64,

    /// Include expected state/nonce values in logged mismatch errors.
    #[serde(default)]
    pub verbose_diagnostics: bool,
}

fn default_validate_authority() -> bool {
    true
}

fn default_callback_timeout_ms() -> u64 {
    60_000
}

impl ClientConfig {
    pub fn new(
        client_id: impl Into<String>,
        authority: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            authority: authority.into(),
            redirect_uri: redirect_uri.into(),
            post_logout_redirect_uri: None,
            validate_authority: default_validate_authority(),
            callback_timeout_ms: default_callback_timeout_ms(),
            verbose_diagnostics: false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_post_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_redirect_uri = Some(uri.into());
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_validate_authority(mut self, validate: bool) -> Self {
        self.validate_authority = validate;
        self
    }

    pub fn with_verbose_diagnostics(mut self, verbose: bool) -> Self {
        self.verbose_diagnostics = verbose;
        self
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.redirect_uri.trim().is_empty() {
            return Err(Error::RedirectUriEmpty);
        }
        Ok(())
    }

    /// The post-logout redirect URI, if one is configured and non-empty.
    pub fn post_logout_redirect_uri(&self) -> Result<&str, Error> {
        match self.post_logout_redirect_uri.as_deref() {
            Some(uri) if !uri.trim().is_empty() => Ok(uri),
            _ => Err(Error::PostLogoutUriEmpty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn from_json_applies_defaults() {
        let config = ClientConfig::from_json(
            r#"{
                "client_id": "cid",
                "authority": "https://login.example.com/tenant",
                "redirect_uri": "https://app.test/callback"
            }"#,
        )
        .unwrap();

        assert_eq!(config.client_id, "cid");
        assert!(config.client_secret.is_none());
        assert!(config.validate_authority);
        assert!(!config.verbose_diagnostics);
        assert_eq!(config.callback_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_json_overrides() {
        let config = ClientConfig::from_json(
            r#"{
                "client_id": "cid",
                "authority": "https://login.example.com/tenant",
                "redirect_uri": "https://app.test/callback",
                "callback_timeout_ms": 500,
                "validate_authority": false,
                "verbose_diagnostics": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.callback_timeout(), Duration::from_millis(500));
        assert!(!config.validate_authority);
        assert!(config.verbose_diagnostics);
    }

    #[test]
    fn empty_redirect_uri_is_rejected() {
        let config = ClientConfig::new("cid", "https://login.example.com/tenant", "  ");
        assert_eq!(
            config.validate().unwrap_err().code(),
            ErrorCode::RedirectUriEmpty
        );
    }

    #[test]
    fn post_logout_uri_required_when_read() {
        let config = ClientConfig::new("cid", "https://login.example.com/t", "https://app.test/cb");
        assert_eq!(
            config.post_logout_redirect_uri().unwrap_err().code().as_str(),
            "post_logout_uri_empty"
        );

        let config = config.with_post_logout_redirect_uri("https://app.test/bye");
        assert_eq!(
            config.post_logout_redirect_uri().unwrap(),
            "https://app.test/bye"
        );
    }
}
