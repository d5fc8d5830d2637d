use anyhow::Result;
use std::time::Duration;

use coho::{auth, config, http_client, routes};

/// Upper bound on how often idle sessions are swept
const SESSION_PURGE_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = config::Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Coho starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    // Shared HTTP client for the OAuth provider and the API
    let client = http_client::build_http_client(
        config.http_connect_timeout,
        config.http_request_timeout,
    )?;
    tracing::info!("HTTP client initialized");

    let auth_manager = auth::AuthManager::new(
        auth::CredentialLoader::new(config.credentials_file.clone()),
        &config.api_base,
        client.clone(),
    );

    // Resolve credentials once up front; the result is cached for the process
    if auth_manager.credentials().is_some() {
        tracing::info!("Cohuman API credentials loaded");
    } else {
        tracing::warn!(
            "No Cohuman API credentials ({} / {} or {})",
            auth::API_KEY_VAR,
            auth::API_SECRET_VAR,
            config.credentials_file.display()
        );
        tracing::warn!("Server will start but sign-in will show the setup page");
    }

    let api = http_client::CohumanClient::new(client, &config.api_base);
    let app_state = routes::AppState::new(config.clone(), auth_manager, api);

    // Sweep idle sessions in the background
    let purge_every = Duration::from_secs(config.session_ttl.clamp(1, SESSION_PURGE_INTERVAL_SECS));
    app_state.sessions.spawn_purge_task(purge_every);

    // Build the application with routes and middleware
    let app = routes::build_app(app_state);

    // Bind to configured host and port
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    print_startup_banner(&config);

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Print startup banner
fn print_startup_banner(config: &config::Config) {
    let banner = r#"
  ____      _           _
 / ___|___ | |__   ___ | |
| |   / _ \| '_ \ / _ \| |
| |__| (_) | | | | (_) |_|
 \____\___/|_| |_|\___/(_)

  Swimming upstream in the Cohuman API
"#;

    println!("{}", banner);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:      http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  API:         {}", config.api_base);
    println!("  Log Level:   {}", config.log_level);
    println!(
        "  Timeouts:    connect {}s, request {}s",
        config.http_connect_timeout, config.http_request_timeout
    );
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
