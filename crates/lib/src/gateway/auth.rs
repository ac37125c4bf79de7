//! Bearer-token gate.
//!
//! One comparison routine serves both the blanket middleware (401 for any failure) and
//! the `/run` handler, which reports a blank header (400) apart from a wrong one (403).

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use super::protocol::messages;
use super::server::GatewayState;

const BEARER_PREFIX: &str = "Bearer ";

/// Result of checking an `Authorization` header against the configured token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authorized,
    /// Header missing, empty, or whitespace-only.
    Blank,
    /// Header present but does not carry the token.
    Invalid,
}

/// Compare `header` with `Bearer <token>`. The `Bearer ` prefix is optional (stripped when
/// present); the remainder must equal `token` exactly, with no trimming.
pub fn check_authorization(header: Option<&str>, token: &str) -> AuthOutcome {
    let Some(value) = header.filter(|v| !v.trim().is_empty()) else {
        return AuthOutcome::Blank;
    };
    let presented = value.strip_prefix(BEARER_PREFIX).unwrap_or(value);
    if presented == token {
        AuthOutcome::Authorized
    } else {
        AuthOutcome::Invalid
    }
}

/// `Authorization` header as a string; non-UTF-8 values count as blank.
pub(crate) fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
}

/// Caller address for logs, or "-" when the server was not started with connect info.
pub(crate) fn caller(addr: Option<&ConnectInfo<SocketAddr>>) -> String {
    addr.map(|ConnectInfo(a)| a.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Blanket gate applied to every route.
///
/// With an empty configured token, requests pass through so `/run` can answer "not supported".
/// `/ping` passes through when `publicPing` is set.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let addr = caller(request.extensions().get::<ConnectInfo<SocketAddr>>());

    if state.token.is_empty() {
        return next.run(request).await;
    }
    if state.config.public_ping && path == "/ping" {
        log::debug!("public ping from {}", addr);
        return next.run(request).await;
    }

    match check_authorization(authorization_header(request.headers()), &state.token) {
        AuthOutcome::Authorized => {
            log::info!("Authorized request from {}: {}", addr, path);
            next.run(request).await
        }
        AuthOutcome::Blank | AuthOutcome::Invalid => {
            log::warn!("Unauthorized request from {}: {}", addr, path);
            (StatusCode::UNAUTHORIZED, messages::UNAUTHORIZED).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_authorized() {
        assert_eq!(
            check_authorization(Some("Bearer secret"), "secret"),
            AuthOutcome::Authorized
        );
    }

    #[test]
    fn wrong_token_is_invalid() {
        assert_eq!(
            check_authorization(Some("Bearer wrong"), "secret"),
            AuthOutcome::Invalid
        );
        assert_eq!(
            check_authorization(Some("Bearer secret "), "secret"),
            AuthOutcome::Invalid
        );
        assert_eq!(
            check_authorization(Some("bearer secret"), "secret"),
            AuthOutcome::Invalid
        );
    }

    #[test]
    fn missing_or_whitespace_header_is_blank() {
        assert_eq!(check_authorization(None, "secret"), AuthOutcome::Blank);
        assert_eq!(check_authorization(Some(""), "secret"), AuthOutcome::Blank);
        assert_eq!(check_authorization(Some("  \t"), "secret"), AuthOutcome::Blank);
    }

    #[test]
    fn prefix_is_optional() {
        assert_eq!(
            check_authorization(Some("secret"), "secret"),
            AuthOutcome::Authorized
        );
    }

    #[test]
    fn header_map_lookup() {
        let mut headers = HeaderMap::new();
        assert_eq!(authorization_header(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer x".parse().expect("header value"));
        assert_eq!(authorization_header(&headers), Some("Bearer x"));
    }

    #[test]
    fn caller_without_connect_info() {
        assert_eq!(caller(None), "-");
        let addr: SocketAddr = "10.0.0.1:5555".parse().expect("addr");
        assert_eq!(caller(Some(&ConnectInfo(addr))), "10.0.0.1:5555");
    }
}
