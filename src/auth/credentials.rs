// Credential loading from the environment or a config file

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

use super::types::Credentials;

pub const API_KEY_VAR: &str = "COHUMAN_API_KEY";
pub const API_SECRET_VAR: &str = "COHUMAN_API_SECRET";

/// Where credentials came from, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Environment,
    File,
}

/// Resolves the consumer credentials once per process
///
/// The environment wins when either variable is set; the config file is only
/// consulted when both are absent. Whatever the first lookup finds (including
/// nothing) is cached until restart.
pub struct CredentialLoader {
    file: PathBuf,
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    cached: OnceCell<Option<Credentials>>,
}

impl CredentialLoader {
    /// Read the process environment, then `file`
    pub fn new(file: PathBuf) -> Self {
        Self::with_lookup(file, |name| std::env::var(name).ok())
    }

    /// Use `lookup` in place of the process environment
    pub fn with_lookup(
        file: PathBuf,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            file,
            lookup: Box::new(lookup),
            cached: OnceCell::new(),
        }
    }

    /// Create a loader whose lookup has already happened
    pub fn with_credentials(credentials: Option<Credentials>) -> Self {
        Self {
            file: PathBuf::new(),
            lookup: Box::new(|_| None),
            cached: OnceCell::with_value(credentials),
        }
    }

    /// Return the cached credentials, loading them on first use
    pub fn load(&self) -> Option<Credentials> {
        self.cached
            .get_or_init(|| resolve(&self.lookup, &self.file))
            .clone()
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Pick a source and load from it
fn resolve(lookup: impl Fn(&str) -> Option<String>, file: &Path) -> Option<Credentials> {
    let found = match from_env(&lookup) {
        EnvLookup::Complete(creds) => Some((creds, Source::Environment)),
        EnvLookup::Partial => {
            tracing::warn!(
                "Only one of {} / {} is set - Cohuman credentials are incomplete",
                API_KEY_VAR,
                API_SECRET_VAR
            );
            None
        }
        EnvLookup::Absent => match load_from_file(file) {
            Ok(creds) => Some((creds, Source::File)),
            Err(e) => {
                tracing::info!("No Cohuman credentials available: {:#}", e);
                None
            }
        },
    };

    found.map(|(creds, source)| {
        tracing::info!(key = %creds.key, source = ?source, "Loaded Cohuman API credentials");
        creds
    })
}

enum EnvLookup {
    Complete(Credentials),
    Partial,
    Absent,
}

fn from_env(lookup: &impl Fn(&str) -> Option<String>) -> EnvLookup {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    match (non_empty(API_KEY_VAR), non_empty(API_SECRET_VAR)) {
        (Some(key), Some(secret)) => EnvLookup::Complete(Credentials { key, secret }),
        (None, None) => EnvLookup::Absent,
        _ => EnvLookup::Partial,
    }
}

/// Load credentials from a YAML or JSON file with `key` and `secret` entries
pub fn load_from_file(path: &Path) -> Result<Credentials> {
    if !path.is_file() {
        anyhow::bail!("credentials file not found: {}", path.display());
    }

    let creds: Credentials = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .with_context(|| format!("Failed to read credentials file: {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("Credentials file must define key and secret: {}", path.display()))?;

    if creds.key.trim().is_empty() || creds.secret.trim().is_empty() {
        anyhow::bail!("Credentials file has an empty key or secret: {}", path.display());
    }

    Ok(creds)
}
