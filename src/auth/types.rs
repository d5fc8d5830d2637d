// Authentication types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Consumer key and secret issued by Cohuman for this application
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// Temporary credential obtained at the start of the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToken {
    pub token: String,
    pub token_secret: String,
    pub authorize_url: String,

    /// Whether the provider acknowledged our `oauth_callback`
    #[serde(default)]
    pub callback_confirmed: bool,
}

/// Long-lived credential used to sign API calls on the user's behalf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub token_secret: String,
}
