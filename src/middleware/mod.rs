// Session and request-tracing middleware

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::routes::AppState;
use crate::session::SESSION_COOKIE;

/// Session middleware
///
/// Attaches the browser's [`SessionHandle`](crate::session::SessionHandle) to
/// the request extensions, starting a new session (and setting the cookie)
/// when the request carries no live one.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = session_id_from_cookies(request.headers())
        .and_then(|id| state.sessions.load(&id));

    let (session, is_new) = match existing {
        Some(session) => (session, false),
        None => (state.sessions.create(), true),
    };

    let cookie = is_new.then(|| session_cookie(session.id()));
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    if let Some(cookie) = cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid session cookie value: {}", e),
        }
    }

    response
}

/// Find our session id among the request's cookies
pub fn session_id_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn session_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

/// Request/response logging for every route
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}
