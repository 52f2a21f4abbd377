use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;

use site_backend::config::CaptchaConfig;
use site_backend::server::{app, AppState};

#[tokio::main]
async fn main() {
    dotenv().ok();
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,site_backend=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let captcha = match CaptchaConfig::from_env() {
        Ok(config) => Some(config),
        Err(e) => {
            // keep the health probe alive; the verify endpoint answers 500
            // until credentials are provided
            tracing::warn!("captcha verification disabled: {}", e);
            None
        }
    };
    let state = Arc::new(AppState::new(captcha));

    let frontend_origin = std::env::var("FRONTEND_URL")
        .ok()
        .and_then(|origin| origin.parse().ok());
    if frontend_origin.is_none() {
        tracing::warn!("FRONTEND_URL not set, allowing any origin");
    }
    let router = app(state, frontend_origin);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind server address");
    tracing::info!("listening on {}", addr);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
