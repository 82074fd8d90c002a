mod authority;
mod cache;
mod client;
mod config;
mod error;
mod flow;
mod http;
mod oidc;
mod pkce;
mod request;
mod state;
mod tokens;

// Flow
pub use flow::{
    Account, AuthClient, CallbackResponse, DispatchOutcome, Dispatcher, FlowKind, FlowState,
    FlowTransition, IdentityResult, PendingRequest,
};

// Core
pub use authority::{
    Authority, AuthorityMetadata, AuthorityResolver, AuthorityType, Endpoints, discover,
};
pub use cache::{CacheLookup, CachedToken, InMemoryTokenCache, TokenCache, TokenCriteria};
pub use client::OAuth2Client;
pub use config::ClientConfig;
pub use error::{Error, ErrorCategory, ErrorCode, ExchangeError, Verbose};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use tokens::{ClientInfo, OAuth2Tokens};

// Utilities
pub use oidc::{Audience, IdTokenClaims, decode_id_token};
pub use pkce::{CodeChallengeMethod, PkceCodes, create_code_challenge};
pub use request::encode_basic_credentials;
pub use state::{RequestCorrelation, issue_token, validate_nonce, validate_state};

// Default HTTP client (behind feature flag)
#[cfg(feature = "reqwest-client")]
pub use http::ReqwestClient;
