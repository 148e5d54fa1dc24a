use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::{
    config::Config,
    handlers::{convert, health, languages, voices},
    middleware::rate_limit,
    state::AppState,
};

/// Builds the public router. The rate limiter is the outermost layer, so
/// CORS preflights are counted like any other request.
pub fn router(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.cfg)?;

    Ok(Router::new()
        .route("/", get(health))
        .route("/api/v1/voices", get(voices))
        .route("/api/v1/tts/languages", get(languages))
        .route("/api/v1/tts/voices", get(voices))
        .route("/api/v1/tts/convert", post(convert))
        .layer(cors)
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .with_state(state))
}

fn cors_layer(cfg: &Config) -> anyhow::Result<CorsLayer> {
    if cfg.cors_allow_any {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origins = cfg
        .cors_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}
