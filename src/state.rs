use std::sync::Arc;

use crate::{config::Config, rate_limiter::RateLimiter, tts::TtsService};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub rate_limiter: Arc<RateLimiter>,
    pub tts: Arc<TtsService>,
}
