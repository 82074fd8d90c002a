use url::Url;

use crate::error::{Error, ExchangeError};
use crate::http::{HttpClient, HttpRequest};
use crate::pkce::PkceCodes;
use crate::request::{create_oauth2_request, encode_basic_credentials, send_token_request};
use crate::state::RequestCorrelation;
use crate::tokens::OAuth2Tokens;

pub struct OAuth2Client {
    client_id: String,
    /// None for public clients (credentials sent in body).
    /// Some for confidential clients (credentials sent via Basic auth).
    client_secret: Option<String>,
    redirect_uri: String,
}

fn parse_endpoint(endpoint: &str) -> Result<Url, Error> {
    Url::parse(endpoint).map_err(|e| Error::EndpointResolution {
        detail: format!("invalid endpoint URL {endpoint}: {e}"),
    })
}

impl OAuth2Client {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Build an authorization URL for the code flow:
    /// response_type=code, client_id, redirect_uri, scope (space-joined),
    /// state, nonce, code_challenge, code_challenge_method, response_mode.
    pub fn create_authorization_url(
        &self,
        authorization_endpoint: &str,
        correlation: &RequestCorrelation,
        pkce: &PkceCodes,
        scopes: &[String],
    ) -> Result<Url, Error> {
        let mut url = parse_endpoint(authorization_endpoint)?;

        {
            let mut params = url.query_pairs_mut();
            params
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri);

            if !scopes.is_empty() {
                params.append_pair("scope", &scopes.join(" "));
            }

            params
                .append_pair("state", &correlation.state)
                .append_pair("nonce", &correlation.nonce)
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", pkce.method.as_str())
                .append_pair("response_mode", "query");
        }

        Ok(url)
    }

    /// Build the end-session URL that signs the user out at the identity
    /// provider and returns them to `post_logout_redirect_uri`.
    pub fn create_logout_url(
        &self,
        end_session_endpoint: &str,
        post_logout_redirect_uri: &str,
        id_token_hint: Option<&str>,
    ) -> Result<Url, Error> {
        let mut url = parse_endpoint(end_session_endpoint)?;

        {
            let mut params = url.query_pairs_mut();
            params
                .append_pair("client_id", &self.client_id)
                .append_pair("post_logout_redirect_uri", post_logout_redirect_uri);
            if let Some(hint) = id_token_hint {
                params.append_pair("id_token_hint", hint);
            }
        }

        Ok(url)
    }

    fn token_request(&self, token_endpoint: &str, mut body: Vec<(String, String)>) -> HttpRequest {
        if self.client_secret.is_none() {
            body.push(("client_id".to_string(), self.client_id.clone()));
        }

        let mut request = create_oauth2_request(token_endpoint, &body);

        if let Some(ref secret) = self.client_secret {
            request.headers.push((
                "Authorization".to_string(),
                encode_basic_credentials(&self.client_id, secret),
            ));
        }

        request
    }

    /// Exchange an authorization code plus PKCE verifier for tokens.
    pub async fn validate_authorization_code(
        &self,
        http_client: &impl HttpClient,
        token_endpoint: &str,
        code: &str,
        code_verifier: &str,
        scopes: &[String],
    ) -> Result<OAuth2Tokens, ExchangeError> {
        let mut body = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("code_verifier".to_string(), code_verifier.to_string()),
            ("redirect_uri".to_string(), self.redirect_uri.clone()),
            ("client_info".to_string(), "1".to_string()),
        ];

        if !scopes.is_empty() {
            body.push(("scope".to_string(), scopes.join(" ")));
        }

        let request = self.token_request(token_endpoint, body);
        send_token_request(http_client, request).await
    }

    /// Refresh an access token.
    pub async fn refresh_access_token(
        &self,
        http_client: &impl HttpClient,
        token_endpoint: &str,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<OAuth2Tokens, ExchangeError> {
        let mut body = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
            ("client_info".to_string(), "1".to_string()),
        ];

        if !scopes.is_empty() {
            body.push(("scope".to_string(), scopes.join(" ")));
        }

        let request = self.token_request(token_endpoint, body);
        send_token_request(http_client, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::pkce::{CodeChallengeMethod, create_code_challenge};
    use std::sync::Mutex;

    struct MockHttpClient {
        responses: Mutex<Vec<HttpResponse>>,
        recorded: Mutex<Vec<HttpRequest>>,
    }

    impl MockHttpClient {
        fn new(responses: Vec<HttpResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                recorded: Mutex::new(Vec::new()),
            }
        }

        fn take_requests(&self) -> Vec<HttpRequest> {
            std::mem::take(&mut self.recorded.lock().unwrap())
        }
    }

    impl HttpClient for MockHttpClient {
        async fn send(
            &self,
            request: HttpRequest,
        ) -> Result<HttpResponse, Box<dyn std::error::Error + Send + Sync>> {
            self.recorded.lock().unwrap().push(request);
            let response = self.responses.lock().unwrap().remove(0);
            Ok(response)
        }
    }

    fn ok_token_response() -> HttpResponse {
        HttpResponse {
            status: 200,
            body: serde_json::to_vec(&serde_json::json!({
                "access_token": "tok",
                "token_type": "Bearer"
            }))
            .unwrap(),
        }
    }

    fn parse_form_body(request: &HttpRequest) -> Vec<(String, String)> {
        url::form_urlencoded::parse(&request.body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn get_header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn fixed_pkce() -> PkceCodes {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string();
        PkceCodes {
            challenge: create_code_challenge(&verifier),
            verifier,
            method: CodeChallengeMethod::S256,
        }
    }

    fn fixed_correlation() -> RequestCorrelation {
        RequestCorrelation {
            state: "random-state".into(),
            nonce: "random-nonce".into(),
        }
    }

    // --- Authorization URL tests ---

    #[test]
    fn auth_url_carries_all_flow_params() {
        let client = OAuth2Client::new("my-client", None, "https://app.test/callback");
        let url = client
            .create_authorization_url(
                "https://example.com/authorize",
                &fixed_correlation(),
                &fixed_pkce(),
                &["openid".to_string(), "profile".to_string()],
            )
            .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/authorize");
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("client_id".into(), "my-client".into())));
        assert!(pairs.contains(&("redirect_uri".into(), "https://app.test/callback".into())));
        assert!(pairs.contains(&("scope".into(), "openid profile".into())));
        assert!(pairs.contains(&("state".into(), "random-state".into())));
        assert!(pairs.contains(&("nonce".into(), "random-nonce".into())));
        assert!(pairs.contains(&(
            "code_challenge".into(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".into()
        )));
        assert!(pairs.contains(&("code_challenge_method".into(), "S256".into())));
    }

    #[test]
    fn auth_url_omits_empty_scope() {
        let client = OAuth2Client::new("cid", None, "https://app.test/callback");
        let url = client
            .create_authorization_url(
                "https://example.com/authorize",
                &fixed_correlation(),
                &fixed_pkce(),
                &[],
            )
            .unwrap();

        assert!(!url.query_pairs().any(|(k, _)| k == "scope"));
    }

    #[test]
    fn auth_url_rejects_unparseable_endpoint() {
        let client = OAuth2Client::new("cid", None, "https://app.test/callback");
        let err = client
            .create_authorization_url("not a url", &fixed_correlation(), &fixed_pkce(), &[])
            .unwrap_err();
        assert!(matches!(err, Error::EndpointResolution { .. }));
    }

    #[test]
    fn logout_url_params() {
        let client = OAuth2Client::new("cid", None, "https://app.test/callback");
        let url = client
            .create_logout_url(
                "https://example.com/logout",
                "https://app.test/bye",
                Some("id.token.hint"),
            )
            .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("post_logout_redirect_uri".into(), "https://app.test/bye".into())));
        assert!(pairs.contains(&("id_token_hint".into(), "id.token.hint".into())));
    }

    // --- Credential transmission tests ---

    #[tokio::test]
    async fn validate_code_confidential_client_uses_basic_auth() {
        let client = OAuth2Client::new("my-id", Some("my-secret".into()), "https://app.test/cb");
        let mock = MockHttpClient::new(vec![ok_token_response()]);

        client
            .validate_authorization_code(&mock, "https://example.com/token", "code123", "verifier", &[])
            .await
            .unwrap();

        let requests = mock.take_requests();
        assert_eq!(requests.len(), 1);

        let auth = get_header(&requests[0], "Authorization").expect("missing Authorization header");
        assert_eq!(auth, encode_basic_credentials("my-id", "my-secret"));

        let body = parse_form_body(&requests[0]);
        assert!(!body.iter().any(|(k, _)| k == "client_id"));
    }

    #[tokio::test]
    async fn validate_code_public_client_sends_verifier_and_client_id() {
        let client = OAuth2Client::new("pub-id", None, "https://app.test/cb");
        let mock = MockHttpClient::new(vec![ok_token_response()]);

        client
            .validate_authorization_code(
                &mock,
                "https://example.com/token",
                "code123",
                "the-verifier",
                &["openid".to_string()],
            )
            .await
            .unwrap();

        let requests = mock.take_requests();
        assert!(get_header(&requests[0], "Authorization").is_none());

        let body = parse_form_body(&requests[0]);
        assert!(body.contains(&("client_id".into(), "pub-id".into())));
        assert!(body.contains(&("grant_type".into(), "authorization_code".into())));
        assert!(body.contains(&("code".into(), "code123".into())));
        assert!(body.contains(&("code_verifier".into(), "the-verifier".into())));
        assert!(body.contains(&("redirect_uri".into(), "https://app.test/cb".into())));
        assert!(body.contains(&("scope".into(), "openid".into())));
    }

    #[tokio::test]
    async fn refresh_sends_refresh_grant() {
        let client = OAuth2Client::new("pub-id", None, "https://app.test/cb");
        let mock = MockHttpClient::new(vec![ok_token_response()]);

        client
            .refresh_access_token(&mock, "https://example.com/token", "rt-1", &[])
            .await
            .unwrap();

        let body = parse_form_body(&mock.take_requests()[0]);
        assert!(body.contains(&("grant_type".into(), "refresh_token".into())));
        assert!(body.contains(&("refresh_token".into(), "rt-1".into())));
        assert!(!body.iter().any(|(k, _)| k == "scope"));
    }
}
