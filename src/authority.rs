//! Authority validation, endpoint discovery and the per-authority metadata
//! cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::http::HttpClient;
use crate::request::create_metadata_request;

const DISCOVERY_SUFFIX: &str = ".well-known/openid-configuration";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityType {
    /// `https://host/{tenant}`
    Default,
    /// `https://host/{partition}/{tenant}`, partition like `eu-west`.
    Regional { partition: String },
    /// `https://host/tfp/{tenant}/{policy}`
    B2C { policy: String },
    /// `https://host/adfs`
    Adfs,
}

/// A validated, normalized authority URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    canonical: String,
    kind: AuthorityType,
    tenant: String,
}

fn is_partition(segment: &str) -> bool {
    let Some((region, zone)) = segment.split_once('-') else {
        return false;
    };
    let zone_letters = zone.trim_end_matches(|c: char| c.is_ascii_digit());
    !region.is_empty()
        && region.chars().all(|c| c.is_ascii_lowercase())
        && !zone_letters.is_empty()
        && zone_letters.chars().all(|c| c.is_ascii_lowercase())
}

impl Authority {
    /// Validate `uri` and classify it. Performs no I/O.
    pub fn parse(uri: &str, validate_authority: bool) -> Result<Self, Error> {
        let url = Url::parse(uri).map_err(|_| Error::InvalidAuthorityType {
            authority: uri.to_string(),
        })?;

        if url.scheme() != "https" {
            return Err(Error::InsecureAuthority {
                authority: uri.to_string(),
            });
        }

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::InvalidAuthorityType {
                authority: uri.to_string(),
            })?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let invalid_path = || Error::InvalidAuthorityPath {
            authority: uri.to_string(),
        };

        let first = segments.first().ok_or_else(invalid_path)?;
        let (kind, tenant) = match first.to_ascii_lowercase().as_str() {
            "adfs" => {
                if validate_authority {
                    return Err(Error::UnsupportedAuthorityValidation);
                }
                if segments.len() != 1 {
                    return Err(invalid_path());
                }
                (AuthorityType::Adfs, "adfs".to_string())
            }
            "tfp" => match segments.as_slice() {
                [_, tenant, policy] => (
                    AuthorityType::B2C {
                        policy: policy.to_string(),
                    },
                    tenant.to_string(),
                ),
                _ => {
                    return Err(Error::B2cAuthorityInvalidPath {
                        authority: uri.to_string(),
                    });
                }
            },
            _ => match segments.as_slice() {
                [tenant] => (AuthorityType::Default, tenant.to_string()),
                [partition, tenant] if is_partition(partition) => (
                    AuthorityType::Regional {
                        partition: partition.to_string(),
                    },
                    tenant.to_string(),
                ),
                _ => return Err(invalid_path()),
            },
        };

        let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
        let canonical = format!("https://{host}{port}/{}/", segments.join("/"));

        Ok(Self {
            canonical,
            kind,
            tenant,
        })
    }

    /// Lowercase scheme and host, no query or fragment, trailing slash.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn kind(&self) -> &AuthorityType {
        &self.kind
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{DISCOVERY_SUFFIX}", self.canonical)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub end_session_endpoint: Option<String>,
}

#[derive(Deserialize)]
struct OpenIdConfiguration {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    #[serde(default)]
    end_session_endpoint: Option<String>,
}

/// An authority plus its discovered endpoints. Immutable once discovery
/// completed.
#[derive(Debug, Clone)]
pub struct AuthorityMetadata {
    authority: Authority,
    endpoints: Option<Endpoints>,
}

impl AuthorityMetadata {
    pub fn undiscovered(authority: Authority) -> Self {
        Self {
            authority,
            endpoints: None,
        }
    }

    pub fn discovered(authority: Authority, endpoints: Endpoints) -> Self {
        Self {
            authority,
            endpoints: Some(endpoints),
        }
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn is_discovery_complete(&self) -> bool {
        self.endpoints.is_some()
    }

    pub fn endpoints(&self) -> Result<&Endpoints, Error> {
        self.endpoints
            .as_ref()
            .ok_or(Error::EndpointDiscoveryIncomplete)
    }

    pub fn issuer(&self) -> Result<&str, Error> {
        Ok(&self.endpoints()?.issuer)
    }

    pub fn authorization_endpoint(&self) -> Result<&str, Error> {
        Ok(&self.endpoints()?.authorization_endpoint)
    }

    pub fn token_endpoint(&self) -> Result<&str, Error> {
        Ok(&self.endpoints()?.token_endpoint)
    }

    pub fn end_session_endpoint(&self) -> Result<Option<&str>, Error> {
        Ok(self.endpoints()?.end_session_endpoint.as_deref())
    }
}

/// Fetch and parse the OpenID configuration document for `authority`.
pub async fn discover(
    http_client: &impl HttpClient,
    authority: &Authority,
) -> Result<Endpoints, Error> {
    let resolution_error = |detail: String| Error::EndpointResolution { detail };

    let url = authority.discovery_url();
    let response = http_client
        .send(create_metadata_request(&url))
        .await
        .map_err(|e| resolution_error(e.to_string()))?;

    if response.status != 200 {
        return Err(resolution_error(format!(
            "discovery returned HTTP {} for {url}",
            response.status
        )));
    }

    let document: OpenIdConfiguration = serde_json::from_slice(&response.body)
        .map_err(|e| resolution_error(format!("malformed discovery document: {e}")))?;

    let tenant = authority.tenant();
    Ok(Endpoints {
        issuer: document
            .issuer
            .replace("{tenantid}", tenant)
            .replace("{tenant}", tenant),
        authorization_endpoint: document.authorization_endpoint,
        token_endpoint: document.token_endpoint,
        end_session_endpoint: document.end_session_endpoint,
    })
}

/// Outcome of one discovery attempt, shared by everyone who awaited it.
type Discovery = Arc<OnceCell<Result<AuthorityMetadata, String>>>;

/// Caches discovery per normalized authority. Concurrent resolves of the
/// same authority share a single discovery request and its outcome,
/// failures included. A failed attempt is evicted once its waiters have
/// seen it, so a later resolve discovers again.
pub struct AuthorityResolver {
    validate_authority: bool,
    entries: Mutex<HashMap<String, Discovery>>,
}

impl AuthorityResolver {
    pub fn new(validate_authority: bool) -> Self {
        Self {
            validate_authority,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, key: &str) -> Discovery {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn evict(&self, key: &str, failed: &Discovery) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).is_some_and(|cell| Arc::ptr_eq(cell, failed)) {
            entries.remove(key);
        }
    }

    pub async fn resolve(
        &self,
        http_client: &impl HttpClient,
        authority_uri: &str,
    ) -> Result<AuthorityMetadata, Error> {
        let authority = Authority::parse(authority_uri, self.validate_authority)?;
        let cell = self.cell(authority.canonical());

        let outcome = cell
            .get_or_init(|| async {
                debug!(authority = authority.canonical(), "discovering endpoints");
                match discover(http_client, &authority).await {
                    Ok(endpoints) => Ok(AuthorityMetadata::discovered(
                        authority.clone(),
                        endpoints,
                    )),
                    Err(err) => {
                        warn!(authority = authority.canonical(), error = %err, "endpoint discovery failed");
                        Err(match err {
                            Error::EndpointResolution { detail } => detail,
                            other => other.to_string(),
                        })
                    }
                }
            })
            .await;

        match outcome {
            Ok(metadata) => Ok(metadata.clone()),
            Err(detail) => {
                self.evict(authority.canonical(), &cell);
                Err(Error::EndpointResolution {
                    detail: detail.clone(),
                })
            }
        }
    }

    /// Cached metadata without triggering discovery.
    pub fn endpoints(&self, authority_uri: &str) -> Result<AuthorityMetadata, Error> {
        let authority = Authority::parse(authority_uri, self.validate_authority)?;
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(authority.canonical())
            .and_then(|cell| cell.get())
            .and_then(|outcome| outcome.as_ref().ok())
            .cloned()
            .ok_or(Error::EndpointDiscoveryIncomplete)
    }

    /// Drop cached metadata so the next resolve discovers again.
    pub fn forget(&self, authority_uri: &str) -> bool {
        let Ok(authority) = Authority::parse(authority_uri, self.validate_authority) else {
            return false;
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(authority.canonical()).is_some()
    }
}
