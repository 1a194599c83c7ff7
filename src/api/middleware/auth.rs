//! Bearer token capture.
//!
//! Extracts `Authorization: Bearer <token>` and injects `AccessToken` into
//! request extensions. The token is not validated here; record-driven
//! handlers forward it to the record store, which decides.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Caller's record-store access token, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessToken(pub Option<String>);

impl AccessToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

pub fn bearer_token<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Inject `AccessToken`. Responses to token-bearing requests carry patient
/// data and are marked `no-store`.
pub async fn capture_token(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let token = bearer_token(&req);
    let has_token = token.is_some();
    req.extensions_mut().insert(AccessToken(token));

    let mut response = next.run(req).await;
    if has_token {
        response
            .headers_mut()
            .insert("Cache-Control", HeaderValue::from_static("no-store"));
    }
    response
}
