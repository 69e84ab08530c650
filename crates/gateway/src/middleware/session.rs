//! Anonymous session cookie middleware
//!
//! Every metered request is attributed to an anonymous session carried in
//! an http-only cookie. A request without one gets a fresh uuid: the id is
//! inserted as a request extension for handlers either way, and the
//! Set-Cookie header is added on the way out unless the path is one that
//! browsers hit incidentally.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::AppState;
use reelsmith_common::SESSION_COOKIE;

/// Session id minted for (or read from) the current request
#[derive(Clone, Debug)]
pub struct SessionId(pub String);

/// Paths that never mint a session cookie
fn is_sessionless(path: &str) -> bool {
    path.ends_with("/health")
        || path.ends_with("/ready")
        || path.starts_with("/metrics")
        || path.contains("favicon")
}

pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let existing = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(session_cookie_value);

    let (session_id, minted) = match existing {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    request
        .extensions_mut()
        .insert(SessionId(session_id.clone()));
    let mut response = next.run(request).await;

    if minted && !is_sessionless(&path) {
        let cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, session_id, state.config.server.session_cookie_max_age_secs
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// Pull our session id out of a Cookie header, ignoring other cookies
fn session_cookie_value(header: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value_extraction() {
        assert_eq!(
            session_cookie_value("anon_session=abc-123"),
            Some("abc-123".to_string())
        );
        assert_eq!(
            session_cookie_value("theme=dark; anon_session=abc; lang=en"),
            Some("abc".to_string())
        );
        assert_eq!(session_cookie_value("theme=dark"), None);
        assert_eq!(session_cookie_value("anon_session="), None);
    }

    #[test]
    fn test_sessionless_paths() {
        assert!(is_sessionless("/v1/health"));
        assert!(is_sessionless("/v1/ready"));
        assert!(is_sessionless("/favicon.ico"));
        assert!(is_sessionless("/metrics"));
        assert!(!is_sessionless("/v1/agents"));
        assert!(!is_sessionless("/v1/video/generate"));
    }
}
