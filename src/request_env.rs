// Request environment: a flat, Rack-style view of the incoming request
//
// Used for the diagnostic table on every page and to work out the public
// site (scheme, host, port) for the OAuth callback URL.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct RequestEnv {
    vars: BTreeMap<String, Value>,
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl RequestEnv {
    /// Capture the environment from request parts
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = &parts.headers;
        let header_str = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let scheme = header_str("x-forwarded-proto")
            .or_else(|| parts.uri.scheme_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string())
            .to_lowercase();

        let authority = header_str("x-forwarded-host")
            .or_else(|| header_str(header::HOST.as_str()))
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());
        let (host, port) = split_host_port(&authority);

        let mut vars = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            vars.insert(key.to_string(), Value::String(value));
        };

        set("REQUEST_METHOD", parts.method.to_string());
        set("PATH_INFO", parts.uri.path().to_string());
        set(
            "QUERY_STRING",
            parts.uri.query().unwrap_or_default().to_string(),
        );
        set("SERVER_PROTOCOL", format!("{:?}", parts.version));
        set("SERVER_NAME", host.clone());
        set(
            "SERVER_PORT",
            port.or_else(|| default_port(&scheme))
                .map(|p| p.to_string())
                .unwrap_or_default(),
        );
        set("URL_SCHEME", scheme.clone());

        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            set("REMOTE_ADDR", addr.ip().to_string());
        }

        for name in headers.keys() {
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            let key = format!(
                "HTTP_{}",
                name.as_str().to_uppercase().replace('-', "_")
            );
            set(&key, values.join(", "));
        }

        Self {
            vars,
            scheme,
            host,
            port,
        }
    }

    /// Scheme and host, with the port only when it is not the scheme's default
    pub fn site(&self) -> String {
        match self.port {
            Some(port) if Some(port) != default_port(&self.scheme) => {
                format!("{}://{}:{}", self.scheme, self.host, port)
            }
            _ => format!("{}://{}", self.scheme, self.host),
        }
    }

    pub fn vars(&self) -> &BTreeMap<String, Value> {
        &self.vars
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestEnv
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Split `host[:port]`, keeping IPv6 literals in brackets
fn split_host_port(authority: &str) -> (String, Option<u16>) {
    if authority.starts_with('[') {
        if let Some((host, rest)) = authority.split_once(']') {
            let port = rest.strip_prefix(':').and_then(|p| p.parse().ok());
            return (format!("{}]", host), port);
        }
        return (authority.to_string(), None);
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (authority.to_string(), None),
        },
        None => (authority.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn env_for(request: Request<()>) -> RequestEnv {
        let (parts, _) = request.into_parts();
        RequestEnv::from_parts(&parts)
    }

    #[test]
    fn test_site_keeps_non_default_port() {
        let env = env_for(
            Request::builder()
                .uri("/authorize")
                .header("host", "localhost:4567")
                .body(())
                .unwrap(),
        );
        assert_eq!(env.site(), "http://localhost:4567");
    }

    #[test]
    fn test_site_drops_default_port() {
        let env = env_for(
            Request::builder()
                .uri("/")
                .header("host", "coho.example.com:80")
                .body(())
                .unwrap(),
        );
        assert_eq!(env.site(), "http://coho.example.com");
    }

    #[test]
    fn test_site_honours_forwarded_proto() {
        let env = env_for(
            Request::builder()
                .uri("/")
                .header("host", "coho.example.com")
                .header("x-forwarded-proto", "https")
                .body(())
                .unwrap(),
        );
        assert_eq!(env.site(), "https://coho.example.com");
    }

    #[test]
    fn test_site_without_host_header() {
        let env = env_for(Request::builder().uri("/").body(()).unwrap());
        assert_eq!(env.site(), "http://localhost");
    }

    #[test]
    fn test_ipv6_host() {
        assert_eq!(
            split_host_port("[::1]:4567"),
            ("[::1]".to_string(), Some(4567))
        );
        assert_eq!(split_host_port("[::1]"), ("[::1]".to_string(), None));
    }

    #[test]
    fn test_vars() {
        let env = env_for(
            Request::builder()
                .method("GET")
                .uri("/users?limit=0")
                .header("host", "localhost:4567")
                .header("user-agent", "curl/8.0")
                .body(())
                .unwrap(),
        );
        let vars = env.vars();
        assert_eq!(vars["REQUEST_METHOD"], "GET");
        assert_eq!(vars["PATH_INFO"], "/users");
        assert_eq!(vars["QUERY_STRING"], "limit=0");
        assert_eq!(vars["SERVER_NAME"], "localhost");
        assert_eq!(vars["SERVER_PORT"], "4567");
        assert_eq!(vars["SERVER_PROTOCOL"], "HTTP/1.1");
        assert_eq!(vars["HTTP_USER_AGENT"], "curl/8.0");
        assert!(!vars.contains_key("REMOTE_ADDR"));
    }
}
