use authflow::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const DISCOVERY_SUFFIX: &str = ".well-known/openid-configuration";

/// An in-memory identity provider. Serves discovery documents for any
/// authority, answers token requests from a FIFO queue and records every
/// request for assertions.
pub struct MockHttpClient {
    /// Pre-configured token endpoint responses, returned in order.
    token_responses: Mutex<Vec<HttpResponse>>,
    /// Recorded requests for assertion.
    recorded: Mutex<Vec<HttpRequest>>,
    discovery_calls: AtomicUsize,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            token_responses: Mutex::new(Vec::new()),
            recorded: Mutex::new(Vec::new()),
            discovery_calls: AtomicUsize::new(0),
        }
    }

    /// Add a token endpoint response to the queue.
    pub fn enqueue_token_response(&self, response: HttpResponse) {
        self.token_responses.lock().unwrap().push(response);
    }

    /// Drain and return all recorded requests.
    pub fn take_requests(&self) -> Vec<HttpRequest> {
        self.recorded.lock().unwrap().drain(..).collect()
    }

    /// Recorded POSTs to a token endpoint.
    pub fn token_requests(&self) -> Vec<HttpRequest> {
        self.recorded
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == HttpMethod::Post)
            .cloned()
            .collect()
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }

    fn discovery_document(base: &str) -> HttpResponse {
        json_response(
            200,
            serde_json::json!({
                "issuer": format!("{base}{{tenantid}}/v2.0"),
                "authorization_endpoint": format!("{base}oauth2/v2.0/authorize"),
                "token_endpoint": format!("{base}oauth2/v2.0/token"),
                "end_session_endpoint": format!("{base}oauth2/v2.0/logout"),
            }),
        )
    }
}

impl HttpClient for MockHttpClient {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, Box<dyn std::error::Error + Send + Sync>> {
        self.recorded.lock().unwrap().push(request.clone());

        match request.method {
            HttpMethod::Get => {
                self.discovery_calls.fetch_add(1, Ordering::SeqCst);
                let base = request
                    .url
                    .strip_suffix(DISCOVERY_SUFFIX)
                    .ok_or("unexpected GET")?;
                Ok(Self::discovery_document(base))
            }
            HttpMethod::Post => {
                let mut queue = self.token_responses.lock().unwrap();
                if queue.is_empty() {
                    return Ok(json_response(
                        500,
                        serde_json::json!({ "error": "server_error" }),
                    ));
                }
                Ok(queue.remove(0))
            }
        }
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        body: serde_json::to_vec(&body).unwrap(),
    }
}

/// Build an unsigned JWT carrying `claims`.
pub fn id_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    format!("{header}.{payload}.signature")
}

/// Standard ID token claims for `nonce`.
pub fn claims(nonce: &str) -> serde_json::Value {
    serde_json::json!({
        "iss": "https://login.example.com/contoso/v2.0",
        "sub": "subject-1",
        "aud": "client-id",
        "exp": 4_000_000_000u64,
        "iat": 1_700_000_000u64,
        "nonce": nonce,
        "tid": "contoso",
        "preferred_username": "ada@example.com",
    })
}

pub fn client_info(uid: &str, utid: &str) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::json!({ "uid": uid, "utid": utid }).to_string())
}

/// A successful token endpoint response.
pub fn token_response(id_token: &str, client_info: Option<&str>) -> HttpResponse {
    let mut body = serde_json::json!({
        "access_token": "access-1",
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-1",
        "scope": "openid profile User.Read",
        "id_token": id_token,
    });
    if let Some(info) = client_info {
        body["client_info"] = serde_json::Value::String(info.to_string());
    }
    json_response(200, body)
}
