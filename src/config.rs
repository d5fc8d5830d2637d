use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Default upstream for both the OAuth provider and the task API
pub const DEFAULT_API_BASE: &str = "http://api.cohuman.com";

/// Coho - swimming upstream in the Cohuman API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "4567")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Base URL of the Cohuman API and OAuth provider
    #[arg(long, env = "COHUMAN_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// YAML or JSON file holding `key` and `secret`, used when the env vars are unset
    #[arg(long, env = "COHUMAN_CONFIG_FILE", default_value = "config/cohuman.yml")]
    pub credentials_file: String,

    /// Upstream connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub http_connect_timeout: u64,

    /// Upstream request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Idle lifetime of a browser session in seconds
    #[arg(long, env = "SESSION_TTL", default_value = "86400")]
    pub session_ttl: u64,

    /// Keep the request token in the session after it has been exchanged
    #[arg(long, env = "KEEP_REQUEST_TOKEN", default_value = "false")]
    pub keep_request_token: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Upstream
    pub api_base: String,
    pub credentials_file: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Sessions
    pub session_ttl: u64,
    pub keep_request_token: bool,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Self::from_args(CliArgs::parse()))
    }

    /// Build a config from already-parsed arguments
    pub fn from_args(args: CliArgs) -> Self {
        Config {
            server_host: args.host,
            server_port: args.port,

            api_base: args.api_base.trim_end_matches('/').to_string(),
            credentials_file: expand_tilde(&args.credentials_file),

            http_connect_timeout: args.http_connect_timeout,
            http_request_timeout: args.http_timeout,

            session_ttl: args.session_ttl,
            keep_request_token: args.keep_request_token,

            log_level: args.log_level,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api_base)
            .map_err(|e| anyhow::anyhow!("COHUMAN_API_BASE is not a URL ({}): {}", e, self.api_base))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            anyhow::bail!(
                "COHUMAN_API_BASE must be an absolute http(s) URL: {}",
                self.api_base
            );
        }

        if self.http_request_timeout == 0 || self.http_connect_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be at least one second");
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
