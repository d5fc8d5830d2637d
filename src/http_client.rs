use anyhow::{Context, Result};
use reqwest::{header, Client, Method};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::auth::signature::OAuthSigner;
use crate::auth::{AccessToken, Credentials};
use crate::error::ApiError;

/// Build the shared HTTP client used for both OAuth and API calls
pub fn build_http_client(connect_timeout: u64, request_timeout: u64) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout))
        .timeout(Duration::from_secs(request_timeout))
        .user_agent(concat!("coho/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

/// Response body as received
#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Json(Value),
    /// Body that did not parse as JSON
    Unparsed(String),
}

/// One response from the Cohuman API, whatever its status
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// e.g. `HTTP/1.1 404 Not Found`
    pub status_line: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: ApiBody,
}

impl ApiResponse {
    /// Value shown on the page: the parsed JSON, or a diagnostic object
    /// carrying the status line, headers and raw body
    pub fn into_result(self) -> Value {
        match self.body {
            ApiBody::Json(value) => value,
            ApiBody::Unparsed(raw) => json!({
                "status": self.status_line,
                "headers": self.headers,
                "body": raw,
            }),
        }
    }
}

/// Signed pass-through client for the Cohuman API
pub struct CohumanClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// API host, without trailing slash
    base_url: String,
}

impl CohumanClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL for a resource path; one leading slash is optional
    pub fn build_url(&self, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        format!("{}/{}", self.base_url, path)
    }

    /// Execute one signed request (no retries)
    ///
    /// HTTP error statuses come back as normal responses; only transport
    /// failures are errors.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        consumer: &Credentials,
        token: &AccessToken,
    ) -> Result<ApiResponse, ApiError> {
        let raw_url = self.build_url(path);
        let url = url::Url::parse(&raw_url)
            .map_err(|e| ApiError::UpstreamApi(format!("invalid URL {}: {}", raw_url, e)))?;

        let signer = OAuthSigner::with_token(consumer, &token.token, &token.token_secret);
        let authorization = signer.authorization_header(&method, &url, &[], &[]);

        tracing::debug!(
            method = %method,
            url = %url,
            "Sending HTTP request"
        );

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(header::AUTHORIZATION, authorization)
            .header(header::CONTENT_TYPE, "application/json");
        if method == Method::POST {
            request = request.header(header::CONTENT_LENGTH, "0");
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&e, &url))?;

        let status = response.status();
        let status_line = format!("{:?} {}", response.version(), status);
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(&e, &url))?;

        if status.is_success() {
            tracing::debug!(status = %status, "Request successful");
        } else {
            tracing::warn!(
                status = %status,
                url = %url,
                "Received error response"
            );
        }

        let body = match serde_json::from_str::<Value>(&text) {
            Ok(value) => ApiBody::Json(value),
            Err(e) => {
                tracing::warn!(
                    status = %status,
                    url = %url,
                    error = %e,
                    "Response body is not JSON"
                );
                ApiBody::Unparsed(text)
            }
        };

        Ok(ApiResponse {
            status_line,
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Categorize a reqwest failure for logging and wrap it
fn transport_error(e: &reqwest::Error, url: &url::Url) -> ApiError {
    let error_kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    };

    tracing::error!(
        error_kind = error_kind,
        error = %e,
        url = %url,
        "HTTP request failed"
    );

    ApiError::UpstreamApi(format!("{} (kind: {})", e, error_kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use proptest::prelude::*;

    fn consumer() -> Credentials {
        Credentials::new("consumer-key", "consumer-secret")
    }

    fn token() -> AccessToken {
        AccessToken {
            token: "acc-token".to_string(),
            token_secret: "acc-secret".to_string(),
        }
    }

    #[test]
    fn test_build_url_strips_one_leading_slash() {
        let client = CohumanClient::new(Client::new(), "http://api.cohuman.com");
        assert_eq!(client.build_url("/tasks"), "http://api.cohuman.com/tasks");
        assert_eq!(client.build_url("tasks"), "http://api.cohuman.com/tasks");
        assert_eq!(
            client.build_url("users?limit=0"),
            "http://api.cohuman.com/users?limit=0"
        );
    }

    #[test]
    fn test_build_url_with_trailing_slash_base() {
        let client = CohumanClient::new(Client::new(), "http://api.cohuman.com/");
        assert_eq!(client.build_url("/projects"), "http://api.cohuman.com/projects");
    }

    #[test]
    fn test_unparsed_body_fallback() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        let response = ApiResponse {
            status_line: "HTTP/1.1 502 Bad Gateway".to_string(),
            status: 502,
            headers,
            body: ApiBody::Unparsed("<h1>oops</h1>".to_string()),
        };

        let result = response.into_result();
        assert_eq!(result["status"], "HTTP/1.1 502 Bad Gateway");
        assert_eq!(result["headers"]["content-type"], "text/html");
        assert_eq!(result["body"], "<h1>oops</h1>");
    }

    #[tokio::test]
    async fn test_signed_get_returns_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tasks")
            .match_header("content-type", "application/json")
            .match_header(
                "authorization",
                Matcher::AllOf(vec![
                    Matcher::Regex(r#"^OAuth "#.to_string()),
                    Matcher::Regex(r#"oauth_consumer_key="consumer-key""#.to_string()),
                    Matcher::Regex(r#"oauth_token="acc-token""#.to_string()),
                ]),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"tasks": [{"id": 1, "name": "Swim upstream"}]}"#)
            .create_async()
            .await;

        let client = CohumanClient::new(Client::new(), &server.url());
        let response = client
            .call(Method::GET, "/tasks", &consumer(), &token())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(
            response.into_result()["tasks"][0]["name"],
            "Swim upstream"
        );
    }

    #[tokio::test]
    async fn test_query_string_is_forwarded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users")
            .match_query(Matcher::UrlEncoded("limit".into(), "0".into()))
            .with_status(200)
            .with_body(r#"{"users": []}"#)
            .create_async()
            .await;

        let client = CohumanClient::new(Client::new(), &server.url());
        let response = client
            .call(Method::GET, "users?limit=0", &consumer(), &token())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.body, ApiBody::Json(json!({"users": []})));
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/logout")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let client = CohumanClient::new(Client::new(), &server.url());
        let response = client
            .call(Method::POST, "/logout", &consumer(), &token())
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        assert!(response.status_line.ends_with("500 Internal Server Error"));
        let result = response.into_result();
        assert_eq!(result["body"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_json_error_body_passes_through() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tasks")
            .with_status(401)
            .with_body(r#"{"error": "token expired"}"#)
            .create_async()
            .await;

        let client = CohumanClient::new(Client::new(), &server.url());
        let response = client
            .call(Method::GET, "tasks", &consumer(), &token())
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(response.into_result(), json!({"error": "token expired"}));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let client = CohumanClient::new(Client::new(), "http://127.0.0.1:9");
        let err = client
            .call(Method::GET, "/tasks", &consumer(), &token())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::UpstreamApi(_)));
    }

    proptest! {
        #[test]
        fn prop_build_url_ignores_single_leading_slash(path in "[a-z][a-z0-9/_-]{0,20}") {
            let client = CohumanClient::new(Client::new(), "http://api.cohuman.com");
            let with_slash = format!("/{}", path);
            prop_assert_eq!(client.build_url(&path), client.build_url(&with_slash));
            prop_assert_eq!(client.build_url(&path), format!("http://api.cohuman.com/{}", path));
        }
    }
}
