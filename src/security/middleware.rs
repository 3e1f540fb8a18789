//! Security Middleware Module
//!
//! Hardening response headers and request-header extraction helpers for
//! the axum surface.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::result::Result as StdResult;

/// Hardening headers attached to every response: content-type sniffing
/// disabled, frame embedding disabled, referrer policy restricted.
pub async fn security_headers_middleware(
    req: Request<Body>,
    next: Next,
) -> StdResult<Response, StatusCode> {
    let mut response = next.run(req).await;

    response
        .headers_mut()
        .insert("X-Content-Type-Options", "nosniff".parse().unwrap());

    response
        .headers_mut()
        .insert("X-Frame-Options", "DENY".parse().unwrap());

    response.headers_mut().insert(
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains".parse().unwrap(),
    );

    response.headers_mut().insert(
        "Referrer-Policy",
        "strict-origin-when-cross-origin".parse().unwrap(),
    );

    Ok(response)
}

/// Extract the bearer credential from an Authorization header
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ").map(|t| t.to_string())
}

/// Extract the client identifier used for rate limiting, preferring
/// forwarded headers over the socket peer.
pub fn extract_client_identifier(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("X-Forwarded-For") {
        if let Ok(raw) = forwarded.to_str() {
            if let Some(first) = raw.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("X-Real-IP") {
        if let Ok(ip) = real_ip.to_str() {
            return ip.to_string();
        }
    }

    "unknown".to_string()
}

/// Extract the user agent, empty string when absent
pub fn extract_user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi".to_string()));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcg=="),
        );
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn test_client_identifier_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("X-Real-IP", HeaderValue::from_static("10.0.0.1"));

        assert_eq!(extract_client_identifier(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_identifier_falls_back() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_identifier(&headers), "unknown");
    }
}
