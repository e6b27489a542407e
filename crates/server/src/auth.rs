//! Authentication Middleware
//!
//! Simple API key authentication for the narration HTTP API. Supports
//! Bearer token authentication via the `Authorization` header.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use narrata_config::Settings;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Track if we've warned about auth being disabled (warn once only)
static AUTH_DISABLED_WARNED: AtomicBool = AtomicBool::new(false);

/// Authentication result after checking config
enum AuthCheck {
    /// Authentication disabled, pass through
    Disabled,
    /// Path is public, pass through
    PublicPath,
    /// Config error
    ConfigError(&'static str),
    /// Need to check API key with this expected key
    CheckKey(String),
}

/// Check auth config and return what action to take.
///
/// Extracts all needed config values synchronously so the lock guard is
/// never held across an await point.
fn check_auth_config(config: &Arc<RwLock<Settings>>, path: &str) -> AuthCheck {
    let config_guard = config.read();
    let auth_config = &config_guard.server.auth;

    if !auth_config.enabled {
        if !AUTH_DISABLED_WARNED.swap(true, Ordering::Relaxed) {
            tracing::warn!("API authentication is disabled; set NARRATA__SERVER__AUTH__ENABLED=true for production");
        }
        return AuthCheck::Disabled;
    }

    if auth_config.public_paths.iter().any(|p| path.starts_with(p.as_str())) {
        return AuthCheck::PublicPath;
    }

    match &auth_config.api_key {
        Some(key) if !key.is_empty() => AuthCheck::CheckKey(key.clone()),
        _ => AuthCheck::ConfigError("auth is enabled but no API key is configured"),
    }
}

/// Authentication middleware that checks for a valid API key.
///
/// Checks for `Authorization: Bearer <api_key>`, skipping authentication for
/// configured public paths (health, metrics, readiness by default). Returns
/// 401 if auth is enabled but the key is missing or invalid.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let config = match request.extensions().get::<Arc<RwLock<Settings>>>() {
        Some(cfg) => cfg.clone(),
        None => {
            tracing::error!("config extension not found on request");
            return (StatusCode::INTERNAL_SERVER_ERROR, "server configuration error").into_response();
        }
    };

    let path = request.uri().path().to_string();
    let auth_check = check_auth_config(&config, &path);

    match auth_check {
        AuthCheck::Disabled | AuthCheck::PublicPath => next.run(request).await,
        AuthCheck::ConfigError(msg) => {
            tracing::error!("{}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, "server authentication not configured").into_response()
        }
        AuthCheck::CheckKey(expected_key) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            match auth_header {
                Some(header) if header.starts_with("Bearer ") => {
                    let provided_key = &header[7..];
                    if constant_time_compare(provided_key.as_bytes(), expected_key.as_bytes()) {
                        next.run(request).await
                    } else {
                        tracing::warn!("invalid API key provided");
                        (StatusCode::UNAUTHORIZED, "invalid API key").into_response()
                    }
                }
                Some(_) => (StatusCode::BAD_REQUEST, "expected Authorization: Bearer <token>").into_response(),
                None => (StatusCode::UNAUTHORIZED, "missing Authorization header").into_response(),
            }
        }
    }
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"secret", b"secret"));
        assert!(!constant_time_compare(b"secret", b"secre"));
        assert!(!constant_time_compare(b"secret", b"secreT"));
        assert!(!constant_time_compare(b"abc", b"xyz"));
    }
}
