// Three-legged OAuth 1.0a handshake against the Cohuman provider

use reqwest::{header, Client, Method};
use std::collections::HashMap;
use url::Url;

use super::signature::{encode, OAuthSigner};
use super::types::{AccessToken, Credentials, RequestToken};
use crate::error::ApiError;

/// Provider endpoints, fixed relative to the API site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub request_token: String,
    pub authorize: String,
    pub access_token: String,
}

impl OAuthEndpoints {
    pub fn for_site(site: &str) -> Self {
        let site = site.trim_end_matches('/');
        Self {
            request_token: format!("{}/api/token/request", site),
            authorize: format!("{}/api/authorize", site),
            access_token: format!("{}/api/token/access", site),
        }
    }
}

/// OAuth consumer bound to this application's credentials
pub struct OAuthConsumer {
    credentials: Credentials,
    endpoints: OAuthEndpoints,
    client: Client,
}

impl OAuthConsumer {
    pub fn new(credentials: Credentials, endpoints: OAuthEndpoints, client: Client) -> Self {
        Self {
            credentials,
            endpoints,
            client,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }

    /// First leg: obtain a request token, registering `callback_url`
    pub async fn get_request_token(&self, callback_url: &str) -> Result<RequestToken, ApiError> {
        tracing::info!(callback = %callback_url, "Requesting OAuth request token");

        let signer = OAuthSigner::consumer_only(&self.credentials);
        let mut fields = self
            .token_request(
                &self.endpoints.request_token,
                &signer,
                &[("oauth_callback", callback_url)],
            )
            .await?;

        let (token, token_secret) = take_token_pair(&mut fields)?;
        let callback_confirmed = fields
            .get("oauth_callback_confirmed")
            .is_some_and(|v| v == "true");
        if !callback_confirmed {
            tracing::warn!("Provider did not confirm the OAuth callback");
        }

        tracing::info!(token = %preview(&token), "Received request token");

        Ok(RequestToken {
            authorize_url: self.build_authorize_url(&token),
            token,
            token_secret,
            callback_confirmed,
        })
    }

    /// Second leg: where to send the browser so the user can grant access
    pub fn build_authorize_url(&self, token: &str) -> String {
        format!("{}?oauth_token={}", self.endpoints.authorize, encode(token))
    }

    /// Third leg: trade an authorized request token for an access token
    pub async fn exchange_for_access_token(
        &self,
        request_token: &RequestToken,
        verifier: Option<&str>,
    ) -> Result<AccessToken, ApiError> {
        tracing::info!(
            token = %preview(&request_token.token),
            has_verifier = verifier.is_some(),
            "Exchanging request token for access token"
        );

        let signer = OAuthSigner::with_token(
            &self.credentials,
            &request_token.token,
            &request_token.token_secret,
        );
        let extra: Vec<(&str, &str)> = verifier
            .map(|v| vec![("oauth_verifier", v)])
            .unwrap_or_default();

        let mut fields = self
            .token_request(&self.endpoints.access_token, &signer, &extra)
            .await?;
        let (token, token_secret) = take_token_pair(&mut fields)?;

        tracing::info!(token = %preview(&token), "Received access token");

        Ok(AccessToken {
            token,
            token_secret,
        })
    }

    /// Signed POST to a token endpoint, returning the form-encoded reply
    async fn token_request(
        &self,
        endpoint: &str,
        signer: &OAuthSigner<'_>,
        extra_oauth: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, ApiError> {
        let url = Url::parse(endpoint)
            .map_err(|e| ApiError::UpstreamAuth(format!("invalid endpoint {}: {}", endpoint, e)))?;
        let authorization = signer.authorization_header(&Method::POST, &url, &[], extra_oauth);

        let response = self
            .client
            .post(url.clone())
            .header(header::AUTHORIZATION, authorization)
            .header(header::CONTENT_LENGTH, "0")
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "OAuth provider unreachable");
                ApiError::UpstreamAuth(format!("{} unreachable: {}", endpoint, e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::UpstreamAuth(format!("failed to read token response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(
                status = status.as_u16(),
                url = %url,
                response_body = %body,
                "OAuth provider rejected token request"
            );
            return Err(ApiError::UpstreamAuth(format!(
                "{} returned {}: {}",
                endpoint,
                status,
                body.trim()
            )));
        }

        Ok(url::form_urlencoded::parse(body.trim().as_bytes())
            .into_owned()
            .collect())
    }
}

fn take_token_pair(fields: &mut HashMap<String, String>) -> Result<(String, String), ApiError> {
    match (fields.remove("oauth_token"), fields.remove("oauth_token_secret")) {
        (Some(token), Some(secret)) if !token.is_empty() => Ok((token, secret)),
        _ => Err(ApiError::UpstreamAuth(
            "token response is missing oauth_token or oauth_token_secret".to_string(),
        )),
    }
}

/// First few characters of a token, for logs
fn preview(token: &str) -> String {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    format!("{}...", &token[..end])
}
