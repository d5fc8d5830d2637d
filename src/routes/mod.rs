use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    middleware as axum_middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{AccessToken, AuthManager, OAuthConsumer, RequestToken};
use crate::config::Config;
use crate::error::ApiError;
use crate::http_client::CohumanClient;
use crate::middleware;
use crate::render::{self, PageView};
use crate::request_env::RequestEnv;
use crate::session::{SessionHandle, SessionStore, ACCESS_TOKEN, REQUEST_TOKEN};

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

const TASKS_PATH: &str = "/tasks";
const USERS_PATH: &str = "/users?limit=0";
const PROJECTS_PATH: &str = "/projects?limit=0";
const LOGOUT_PATH: &str = "/logout";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthManager>,
    pub api: Arc<CohumanClient>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config, auth: AuthManager, api: CohumanClient) -> Self {
        let sessions = SessionStore::new(config.session_ttl);
        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            api: Arc::new(api),
            sessions,
        }
    }

    /// State with fixed credentials talking to `api_base`
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing(credentials: Option<crate::auth::Credentials>, api_base: &str) -> Self {
        let config = Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 4567,
            api_base: api_base.to_string(),
            credentials_file: std::path::PathBuf::from("config/cohuman.yml"),
            http_connect_timeout: 5,
            http_request_timeout: 5,
            session_ttl: 3600,
            keep_request_token: false,
            log_level: "info".to_string(),
        };

        Self::new(
            config,
            AuthManager::new_for_testing(credentials, api_base),
            CohumanClient::new(reqwest::Client::new(), api_base),
        )
    }
}

/// Query string the provider appends to the callback URL
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
}

/// Health check routes (no session required)
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

/// Browser-facing pages, all behind the session middleware
pub fn page_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/authorize", get(authorize_handler))
        .route("/authorized", get(authorized_handler))
        .route("/logout", get(logout_handler))
        .route("/tasks", get(tasks_handler))
        .route("/users", get(users_handler))
        .route("/projects", get(projects_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .with_state(state)
}

/// Build the application with all routes and middleware
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(page_routes(state))
        .layer(middleware::trace_layer())
}

/// 302 Found
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn page(
    session: &SessionHandle,
    env: &RequestEnv,
    query: Option<&str>,
    result: Option<&Value>,
) -> Html<String> {
    let snapshot = session.snapshot();
    Html(render::render_page(&PageView {
        signed_in: access_token(session).is_some(),
        session: &snapshot,
        env: env.vars(),
        query,
        result,
    }))
}

fn setup_page(state: &AppState, session: &SessionHandle, env: &RequestEnv) -> Response {
    tracing::warn!(
        file = %state.auth.credentials_file().display(),
        "Cohuman API credentials are not configured"
    );
    Html(render::render_setup_page(
        &session.snapshot(),
        env.vars(),
        state.auth.credentials_file(),
    ))
    .into_response()
}

/// The session's access token, if it holds a usable one
fn access_token(session: &SessionHandle) -> Option<AccessToken> {
    session.get(ACCESS_TOKEN)
}

/// The consumer and access token needed for an API call, or the response to
/// send instead
fn signed_in(
    state: &AppState,
    session: &SessionHandle,
    env: &RequestEnv,
) -> Result<(Arc<OAuthConsumer>, AccessToken), Response> {
    let Some(token) = access_token(session) else {
        tracing::debug!("Not signed in, redirecting home");
        return Err(found("/"));
    };
    let Some(consumer) = state.auth.consumer() else {
        return Err(setup_page(state, session, env));
    };
    Ok((consumer, token))
}

/// GET /health - Health check for load balancers
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// GET / - Home page, no query
async fn root_handler(
    Extension(session): Extension<SessionHandle>,
    env: RequestEnv,
) -> Html<String> {
    page(&session, &env, None, None)
}

/// GET /authorize - Start the OAuth handshake
///
/// Obtains a request token, keeps it in the session and sends the browser to
/// the provider's authorize page. Renders the setup page instead when no
/// credentials are configured.
async fn authorize_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    env: RequestEnv,
) -> Result<Response, ApiError> {
    let Some(consumer) = state.auth.consumer() else {
        return Ok(setup_page(&state, &session, &env));
    };

    let callback = format!("{}/authorized", env.site());
    let request_token = consumer.get_request_token(&callback).await?;
    session.insert(REQUEST_TOKEN, &request_token)?;

    tracing::info!(session = %session.id(), "Redirecting to Cohuman for authorization");
    Ok(found(&request_token.authorize_url))
}

/// GET /authorized - OAuth callback
///
/// Exchanges the stored request token for an access token and returns home.
async fn authorized_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    env: RequestEnv,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let request_token: RequestToken = session
        .get(REQUEST_TOKEN)
        .ok_or(ApiError::MissingRequestToken)?;

    if let Some(returned) = params.oauth_token.as_deref() {
        if returned != request_token.token {
            tracing::warn!("Callback oauth_token does not match the token in the session");
        }
    }

    let Some(consumer) = state.auth.consumer() else {
        return Ok(setup_page(&state, &session, &env));
    };
    let access_token = consumer
        .exchange_for_access_token(&request_token, params.oauth_verifier.as_deref())
        .await?;

    session.insert(ACCESS_TOKEN, &access_token)?;
    if !state.config.keep_request_token {
        session.remove(REQUEST_TOKEN);
    }

    tracing::info!(session = %session.id(), "Signed in to Cohuman");
    Ok(found("/"))
}

/// GET /logout - Sign out upstream and forget both tokens
async fn logout_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    env: RequestEnv,
) -> Result<Response, ApiError> {
    let (consumer, token) = match signed_in(&state, &session, &env) {
        Ok(pair) => pair,
        Err(response) => return Ok(response),
    };

    let query = state.api.build_url(LOGOUT_PATH);
    let result = state
        .api
        .call(Method::POST, LOGOUT_PATH, consumer.credentials(), &token)
        .await?
        .into_result();

    session.remove(ACCESS_TOKEN);
    session.remove(REQUEST_TOKEN);
    tracing::info!(session = %session.id(), "Signed out of Cohuman");

    Ok(page(&session, &env, Some(&query), Some(&result)).into_response())
}

/// GET /tasks
async fn tasks_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    env: RequestEnv,
) -> Result<Response, ApiError> {
    list_page(&state, &session, &env, TASKS_PATH).await
}

/// GET /users
async fn users_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    env: RequestEnv,
) -> Result<Response, ApiError> {
    list_page(&state, &session, &env, USERS_PATH).await
}

/// GET /projects
async fn projects_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    env: RequestEnv,
) -> Result<Response, ApiError> {
    list_page(&state, &session, &env, PROJECTS_PATH).await
}

/// Fetch `path` from the API and show it verbatim
async fn list_page(
    state: &AppState,
    session: &SessionHandle,
    env: &RequestEnv,
    path: &str,
) -> Result<Response, ApiError> {
    let (consumer, token) = match signed_in(state, session, env) {
        Ok(pair) => pair,
        Err(response) => return Ok(response),
    };

    let query = state.api.build_url(path);
    let result = state
        .api
        .call(Method::GET, path, consumer.credentials(), &token)
        .await?
        .into_result();

    Ok(page(session, env, Some(&query), Some(&result)).into_response())
}
