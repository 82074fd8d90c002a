use std::fmt;

/// Stable, machine-matchable error codes. The string forms are a public
/// contract and never change once released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MultipleMatchingTokens,
    MultipleAuthorities,
    InvalidAuthorityType,
    EndpointResolution,
    PopupWindow,
    TokenRenewalTimeout,
    InvalidIdToken,
    InvalidState,
    NonceMismatch,
    LoginInProgress,
    AcquireTokenInProgress,
    UserCancelled,
    Callback,
    UserLoginRequired,
    UserNonExistent,
    ClientInfoDecoding,
    ClientInfoNotPopulated,
    EmptyIdToken,
    IdTokenParsing,
    TokenEncoding,
    InvalidInteractionType,
    UrlSegment,
    InsecureAuthority,
    InvalidAuthorityPath,
    EndpointDiscoveryIncomplete,
    UnsupportedAuthorityValidation,
    B2cAuthorityInvalidPath,
    RedirectUriEmpty,
    PostLogoutUriEmpty,
    PkceGeneration,
    TokenExchange,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleMatchingTokens => "multiple_matching_tokens",
            Self::MultipleAuthorities => "multiple_authorities",
            Self::InvalidAuthorityType => "invalid_authority_type",
            Self::EndpointResolution => "endpoints_resolution_error",
            Self::PopupWindow => "popup_window_error",
            Self::TokenRenewalTimeout => "token_renewal_error",
            Self::InvalidIdToken => "invalid_id_token",
            Self::InvalidState => "invalid_state_error",
            Self::NonceMismatch => "nonce_mismatch_error",
            Self::LoginInProgress => "login_progress_error",
            Self::AcquireTokenInProgress => "acquiretoken_progress_error",
            Self::UserCancelled => "user_cancelled",
            Self::Callback => "callback_error",
            Self::UserLoginRequired => "user_login_error",
            Self::UserNonExistent => "user_non_existent",
            Self::ClientInfoDecoding => "client_info_decoding_error",
            Self::ClientInfoNotPopulated => "client_info_not_populated_error",
            Self::EmptyIdToken => "null_or_empty_id_token",
            Self::IdTokenParsing => "id_token_parsing_error",
            Self::TokenEncoding => "token_encoding_error",
            Self::InvalidInteractionType => "invalid_interaction_type",
            Self::UrlSegment => "url_segment_error",
            Self::InsecureAuthority => "authority_uri_insecure",
            Self::InvalidAuthorityPath => "authority_uri_invalid_path",
            Self::EndpointDiscoveryIncomplete => "endpt_discovery_incomplete",
            Self::UnsupportedAuthorityValidation => "unsupported_authority_validation",
            Self::B2cAuthorityInvalidPath => "b2c_authority_uri_invalid_path",
            Self::RedirectUriEmpty => "redirect_uri_empty",
            Self::PostLogoutUriEmpty => "post_logout_uri_empty",
            Self::PkceGeneration => "pkce_not_created",
            Self::TokenExchange => "token_exchange_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a caller is expected to react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Authority or redirect URI malformed or missing. Fix the configuration.
    Configuration,
    /// A flow of the same kind is already running. Await or cancel it.
    Conflict,
    /// State/nonce mismatch or a malformed token. The flow was aborted.
    Validation,
    /// Network, timeout or popup failure. Retrying is reasonable.
    Transport,
    /// The user backed out. Not a fault.
    User,
}

/// Failures talking to the token endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// OAuth2 error response (HTTP 400/401 with standard error JSON body).
    /// Per RFC 6749 Section 5.2.
    #[error("OAuth2 error: {code}")]
    OAuthRequest {
        code: String,
        description: Option<String>,
        uri: Option<String>,
    },

    /// Token endpoint returned a non-200/400/401 status.
    #[error("Unexpected HTTP status: {status}")]
    UnexpectedResponse { status: u16 },

    /// Token endpoint returned 400/401 but the body is not valid
    /// OAuth2 error JSON.
    #[error("Unparseable error response (HTTP {status})")]
    UnexpectedErrorBody { status: u16, body: String },

    /// Network / transport error from the HTTP client.
    #[error("HTTP request failed: {0}")]
    Http(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// A required field is missing from the token response JSON.
    #[error("Missing or invalid field: {field}")]
    MissingField { field: &'static str },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(
        "The cache contains multiple tokens satisfying the requirements. Call the method again with a narrower set of scopes or a specific account."
    )]
    MultipleMatchingTokens,

    #[error("Multiple authorities found in the cache. Pass an authority explicitly.")]
    MultipleAuthorities,

    #[error("The given authority is not a valid type of authority supported: {authority}")]
    InvalidAuthorityType { authority: String },

    #[error("Error: could not resolve endpoints. Detail: {detail}")]
    EndpointResolution { detail: String },

    #[error("Error opening the interaction window: {detail}")]
    PopupWindow { detail: String },

    #[error("Token renewal operation failed due to timeout.")]
    TokenRenewalTimeout,

    #[error("Invalid ID token format: {detail}")]
    InvalidIdToken { detail: String },

    #[error("State mismatch. Received state: {received}, expected state: [redacted]")]
    InvalidState { received: String, expected: String },

    #[error("Nonce mismatch. Received nonce: {received}, expected nonce: [redacted]")]
    NonceMismatch { received: String, expected: String },

    #[error("Login is in progress. Wait for it to finish or cancel it before starting another.")]
    LoginInProgress,

    #[error(
        "Acquire token is in progress. Wait for it to finish or cancel it before starting another."
    )]
    AcquireTokenInProgress,

    #[error("User cancelled the flow.")]
    UserCancelled,

    #[error("Error in callback: {code}{}", parenthesized(.description))]
    Callback {
        code: String,
        description: Option<String>,
    },

    #[error("User login is required.")]
    UserLoginRequired,

    #[error("User object does not exist. Sign in first.")]
    UserNonExistent,

    #[error("The client info could not be parsed/decoded correctly: {detail}")]
    ClientInfoDecoding { detail: String },

    #[error("The service did not populate client_info in the response.")]
    ClientInfoNotPopulated,

    #[error("The ID token is null or empty.")]
    EmptyIdToken,

    #[error("ID token cannot be parsed: {detail}")]
    IdTokenParsing { detail: String },

    #[error("The token is not a three-segment encoded token: {detail}")]
    TokenEncoding { detail: String },

    #[error("The interaction type is incorrect or has no pending request: {interaction}")]
    InvalidInteractionType { interaction: String },

    #[error("URL segments are empty or malformed: {uri}")]
    UrlSegment { uri: String },

    #[error("Authority URIs must use https: {authority}")]
    InsecureAuthority { authority: String },

    #[error("The authority URI path has an unsupported shape: {authority}")]
    InvalidAuthorityPath { authority: String },

    #[error("Endpoint discovery has not completed for this authority.")]
    EndpointDiscoveryIncomplete,

    #[error("Authority validation is not supported for this authority type.")]
    UnsupportedAuthorityValidation,

    #[error("The B2C authority URI must have the form https://host/tfp/tenant/policy: {authority}")]
    B2cAuthorityInvalidPath { authority: String },

    #[error("A redirect URI is required.")]
    RedirectUriEmpty,

    #[error("A post-logout redirect URI is required.")]
    PostLogoutUriEmpty,

    #[error("The PKCE code challenge and verifier could not be generated: {detail}")]
    PkceGeneration { detail: String },

    #[error("Token exchange failed: {0}")]
    TokenExchange(#[from] ExchangeError),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MultipleMatchingTokens => ErrorCode::MultipleMatchingTokens,
            Self::MultipleAuthorities => ErrorCode::MultipleAuthorities,
            Self::InvalidAuthorityType { .. } => ErrorCode::InvalidAuthorityType,
            Self::EndpointResolution { .. } => ErrorCode::EndpointResolution,
            Self::PopupWindow { .. } => ErrorCode::PopupWindow,
            Self::TokenRenewalTimeout => ErrorCode::TokenRenewalTimeout,
            Self::InvalidIdToken { .. } => ErrorCode::InvalidIdToken,
            Self::InvalidState { .. } => ErrorCode::InvalidState,
            Self::NonceMismatch { .. } => ErrorCode::NonceMismatch,
            Self::LoginInProgress => ErrorCode::LoginInProgress,
            Self::AcquireTokenInProgress => ErrorCode::AcquireTokenInProgress,
            Self::UserCancelled => ErrorCode::UserCancelled,
            Self::Callback { .. } => ErrorCode::Callback,
            Self::UserLoginRequired => ErrorCode::UserLoginRequired,
            Self::UserNonExistent => ErrorCode::UserNonExistent,
            Self::ClientInfoDecoding { .. } => ErrorCode::ClientInfoDecoding,
            Self::ClientInfoNotPopulated => ErrorCode::ClientInfoNotPopulated,
            Self::EmptyIdToken => ErrorCode::EmptyIdToken,
            Self::IdTokenParsing { .. } => ErrorCode::IdTokenParsing,
            Self::TokenEncoding { .. } => ErrorCode::TokenEncoding,
            Self::InvalidInteractionType { .. } => ErrorCode::InvalidInteractionType,
            Self::UrlSegment { .. } => ErrorCode::UrlSegment,
            Self::InsecureAuthority { .. } => ErrorCode::InsecureAuthority,
            Self::InvalidAuthorityPath { .. } => ErrorCode::InvalidAuthorityPath,
            Self::EndpointDiscoveryIncomplete => ErrorCode::EndpointDiscoveryIncomplete,
            Self::UnsupportedAuthorityValidation => ErrorCode::UnsupportedAuthorityValidation,
            Self::B2cAuthorityInvalidPath { .. } => ErrorCode::B2cAuthorityInvalidPath,
            Self::RedirectUriEmpty => ErrorCode::RedirectUriEmpty,
            Self::PostLogoutUriEmpty => ErrorCode::PostLogoutUriEmpty,
            Self::PkceGeneration { .. } => ErrorCode::PkceGeneration,
            Self::TokenExchange(_) => ErrorCode::TokenExchange,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            ErrorCode::InvalidAuthorityType
            | ErrorCode::InsecureAuthority
            | ErrorCode::InvalidAuthorityPath
            | ErrorCode::UnsupportedAuthorityValidation
            | ErrorCode::B2cAuthorityInvalidPath
            | ErrorCode::RedirectUriEmpty
            | ErrorCode::PostLogoutUriEmpty
            | ErrorCode::MultipleAuthorities
            | ErrorCode::InvalidInteractionType
            | ErrorCode::UrlSegment => ErrorCategory::Configuration,
            ErrorCode::LoginInProgress | ErrorCode::AcquireTokenInProgress => {
                ErrorCategory::Conflict
            }
            ErrorCode::InvalidState
            | ErrorCode::NonceMismatch
            | ErrorCode::InvalidIdToken
            | ErrorCode::EmptyIdToken
            | ErrorCode::IdTokenParsing
            | ErrorCode::TokenEncoding
            | ErrorCode::ClientInfoDecoding
            | ErrorCode::ClientInfoNotPopulated
            | ErrorCode::MultipleMatchingTokens
            | ErrorCode::Callback
            | ErrorCode::UserLoginRequired
            | ErrorCode::UserNonExistent
            | ErrorCode::PkceGeneration => ErrorCategory::Validation,
            ErrorCode::EndpointResolution
            | ErrorCode::EndpointDiscoveryIncomplete
            | ErrorCode::PopupWindow
            | ErrorCode::TokenRenewalTimeout
            | ErrorCode::TokenExchange => ErrorCategory::Transport,
            ErrorCode::UserCancelled => ErrorCategory::User,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    /// Rendering that includes the expected state/nonce values. Only for
    /// deployments that opted into verbose diagnostics.
    pub fn verbose(&self) -> Verbose<'_> {
        Verbose(self)
    }
}

fn parenthesized(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

pub struct Verbose<'a>(&'a Error);

impl fmt::Display for Verbose<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Error::InvalidState { received, expected } => write!(
                f,
                "State mismatch. Received state: {received}, expected state: {expected}"
            ),
            Error::NonceMismatch { received, expected } => write!(
                f,
                "Nonce mismatch. Received nonce: {received}, expected nonce: {expected}"
            ),
            other => write!(f, "{other}"),
        }
    }
}
