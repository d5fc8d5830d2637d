// Coho - library root

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod middleware;
pub mod render;
pub mod request_env;
pub mod routes;
pub mod session;
