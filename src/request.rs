use base64::Engine;

use crate::error::ExchangeError;
use crate::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use crate::tokens::OAuth2Tokens;

const USER_AGENT: &str = "authflow";

/// Build a standard OAuth2 POST request.
/// Sets Content-Type, Accept: application/json, User-Agent: authflow.
pub fn create_oauth2_request(endpoint: &str, body: &[(String, String)]) -> HttpRequest {
    let encoded_body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(body)
        .finish();

    HttpRequest {
        method: HttpMethod::Post,
        url: endpoint.to_string(),
        headers: vec![
            (
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ),
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ],
        body: encoded_body.into_bytes(),
    }
}

/// Build a GET request for a JSON metadata document.
pub fn create_metadata_request(url: &str) -> HttpRequest {
    HttpRequest {
        method: HttpMethod::Get,
        url: url.to_string(),
        headers: vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ],
        body: Vec::new(),
    }
}

/// Encode client credentials as HTTP Basic auth header value.
/// Returns `Basic <base64(client_id:client_secret)>`.
pub fn encode_basic_credentials(client_id: &str, client_secret: &str) -> String {
    let credentials = format!("{client_id}:{client_secret}");
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
    format!("Basic {encoded}")
}

fn oauth_error(json: &serde_json::Value) -> Option<ExchangeError> {
    let code = json.get("error").and_then(|e| e.as_str())?;
    let text = |key: &str| json.get(key).and_then(|v| v.as_str()).map(String::from);
    Some(ExchangeError::OAuthRequest {
        code: code.to_string(),
        description: text("error_description"),
        uri: text("error_uri"),
    })
}

/// Send a token request and interpret the response.
/// - 200 -> Ok(OAuth2Tokens), unless the body carries an `error` field
/// - 400/401 with valid error JSON -> Err(ExchangeError::OAuthRequest { .. })
/// - 400/401 with invalid body -> Err(ExchangeError::UnexpectedErrorBody { .. })
/// - Other status -> Err(ExchangeError::UnexpectedResponse { .. })
pub async fn send_token_request(
    client: &impl HttpClient,
    request: HttpRequest,
) -> Result<OAuth2Tokens, ExchangeError> {
    let response: HttpResponse = client.send(request).await?;

    match response.status {
        200 => {
            let json: serde_json::Value = serde_json::from_slice(&response.body).map_err(|_| {
                ExchangeError::UnexpectedErrorBody {
                    status: 200,
                    body: String::from_utf8_lossy(&response.body).into_owned(),
                }
            })?;
            match oauth_error(&json) {
                Some(err) => Err(err),
                None => Ok(OAuth2Tokens::new(json)),
            }
        }
        400 | 401 => {
            let body_str = String::from_utf8_lossy(&response.body).into_owned();
            match serde_json::from_str::<serde_json::Value>(&body_str)
                .ok()
                .as_ref()
                .and_then(oauth_error)
            {
                Some(err) => Err(err),
                None => Err(ExchangeError::UnexpectedErrorBody {
                    status: response.status,
                    body: body_str,
                }),
            }
        }
        status => Err(ExchangeError::UnexpectedResponse { status }),
    }
}
