use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/contoso/oauth2/v2.0/token";

/// A token endpoint built on `wiremock`, for exercising the real
/// `ReqwestClient` transport.
pub struct MockTokenEndpoint {
    server: MockServer,
}

impl MockTokenEndpoint {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Full URL of the token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.server.uri())
    }

    /// Answer every token request with HTTP 200 and `response`.
    pub async fn mock_success(&self, response: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response))
            .mount(&self.server)
            .await;
    }

    /// Answer only the given grant type with `response`.
    pub async fn mock_grant(&self, grant_type: &str, response: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains(format!("grant_type={grant_type}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response))
            .mount(&self.server)
            .await;
    }

    /// Answer with a standard OAuth2 error body and `status`.
    pub async fn mock_error(&self, status: u16, error_code: &str, description: &str) {
        let body = serde_json::json!({
            "error": error_code,
            "error_description": description,
        });
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(&body))
            .mount(&self.server)
            .await;
    }

    /// Answer with `status` and a body that is not an OAuth2 error.
    pub async fn mock_raw(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Form parameters of the last request received.
    pub async fn last_form(&self) -> Vec<(String, String)> {
        let requests = self
            .server
            .received_requests()
            .await
            .expect("request recording enabled");
        let last = requests.last().expect("expected at least one request");
        url::form_urlencoded::parse(&last.body).into_owned().collect()
    }

    /// The Authorization header of the last request, if any.
    pub async fn last_authorization(&self) -> Option<String> {
        let requests = self
            .server
            .received_requests()
            .await
            .expect("request recording enabled");
        let last = requests.last().expect("expected at least one request");
        last.headers
            .get("authorization")
            .map(|v| v.to_str().unwrap().to_string())
    }
}
