// Authentication module
// Credential loading, OAuth 1.0a signing and the three-legged handshake

mod credentials;
mod manager;
mod oauth;
pub mod signature;
mod types;

pub use credentials::{CredentialLoader, API_KEY_VAR, API_SECRET_VAR};
pub use manager::AuthManager;
pub use oauth::{OAuthConsumer, OAuthEndpoints};
pub use types::{AccessToken, Credentials, RequestToken};
