use once_cell::sync::OnceCell;
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;

use super::credentials::CredentialLoader;
use super::oauth::{OAuthConsumer, OAuthEndpoints};
use super::types::Credentials;

/// Authentication manager
/// Owns the credential cache and the lazily built OAuth consumer
pub struct AuthManager {
    /// Credential lookup, cached after the first call
    loader: CredentialLoader,

    /// Provider endpoints
    endpoints: OAuthEndpoints,

    /// Shared HTTP client for token requests
    client: Client,

    /// Consumer built from the credentials on first use
    consumer: OnceCell<Option<Arc<OAuthConsumer>>>,
}

impl AuthManager {
    /// Create a new AuthManager
    pub fn new(loader: CredentialLoader, api_base: &str, client: Client) -> Self {
        Self {
            loader,
            endpoints: OAuthEndpoints::for_site(api_base),
            client,
            consumer: OnceCell::new(),
        }
    }

    /// Create an AuthManager with fixed credentials (no env or file lookup)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(credentials: Option<Credentials>, api_base: &str) -> Self {
        Self::new(
            CredentialLoader::with_credentials(credentials),
            api_base,
            Client::new(),
        )
    }

    /// Consumer credentials, if configured
    pub fn credentials(&self) -> Option<Credentials> {
        self.loader.load()
    }

    /// The OAuth consumer, or `None` when credentials are missing
    pub fn consumer(&self) -> Option<Arc<OAuthConsumer>> {
        self.consumer
            .get_or_init(|| {
                self.loader.load().map(|credentials| {
                    Arc::new(OAuthConsumer::new(
                        credentials,
                        self.endpoints.clone(),
                        self.client.clone(),
                    ))
                })
            })
            .clone()
    }

    /// File consulted when the environment has no credentials
    pub fn credentials_file(&self) -> &Path {
        self.loader.file()
    }

    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_missing_without_credentials() {
        let manager = AuthManager::new_for_testing(None, "http://api.cohuman.com");
        assert!(manager.consumer().is_none());
        assert!(manager.credentials().is_none());
    }

    #[test]
    fn test_consumer_is_built_once() {
        let manager = AuthManager::new_for_testing(
            Some(Credentials::new("key", "secret")),
            "http://api.cohuman.com",
        );

        let first = manager.consumer().unwrap();
        let second = manager.consumer().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.credentials().key, "key");
        assert_eq!(
            first.endpoints().authorize,
            "http://api.cohuman.com/api/authorize"
        );
    }
}
