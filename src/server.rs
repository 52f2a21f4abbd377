use std::sync::Arc;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, RateLimiter};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::captcha::verifier::CaptchaVerifier;
use crate::config::CaptchaConfig;
use crate::handlers::recaptcha_handlers;

pub struct AppState {
    /// None when no captcha credentials are configured; the verify endpoint
    /// then answers 500 while the rest of the service stays up.
    pub verifier: Option<CaptchaVerifier>,
    pub verify_limiter:
        DashMap<String, RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>>,
}

impl AppState {
    pub fn new(captcha: Option<CaptchaConfig>) -> Self {
        Self {
            verifier: captcha.map(CaptchaVerifier::new),
            verify_limiter: DashMap::new(),
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}

/// Build the service router. `allowed_origin` restricts CORS to the site's
/// own origin; without one (local development) any origin is allowed.
pub fn app(state: Arc<AppState>, allowed_origin: Option<HeaderValue>) -> Router {
    let cors = match allowed_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([CONTENT_TYPE]),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([CONTENT_TYPE]),
    };

    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/recaptcha/verify",
            post(recaptcha_handlers::verify_captcha),
        )
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
