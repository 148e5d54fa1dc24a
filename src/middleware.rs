use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{error::AppError, state::AppState};

/// Key shared by every request whose origin cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub const RATE_LIMITED_DETAIL: &str = "Too many requests. Please try again later.";

/// Admits or rejects each request before it reaches a handler.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let client = client_key(&req, state.cfg.trust_forwarded_for);

    if state.rate_limiter.check(&client).await.is_admitted() {
        return next.run(req).await;
    }

    warn!(client = %client, path = %req.uri().path(), "rate limit exceeded");
    AppError::new(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_DETAIL).into_response()
}

pub fn client_key(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(forwarded) = first_forwarded_hop(req.headers()) {
            return forwarded;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn first_forwarded_hop(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|hop| !hop.is_empty())
        .map(str::to_string)
}
