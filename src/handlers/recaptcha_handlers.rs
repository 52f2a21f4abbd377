use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    Json,
};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::captcha::verifier::DecisionReason;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct VerifyRequest {
    token: Option<String>,
    action: Option<String>,
}

/// Proxy a challenge token to the verification service and report the
/// decision: 200 on accept, 400 for rejected/missing tokens, 502 when the
/// service cannot be reached, 500 when no credentials are configured.
pub async fn verify_captcha(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // Rate limit: 10 verification attempts per minute per client address
    let quota = Quota::per_minute(NonZeroU32::new(10).unwrap());
    let limiter_key = addr.ip().to_string();
    let exceeded = {
        let entry = state
            .verify_limiter
            .entry(limiter_key.clone())
            .or_insert_with(|| RateLimiter::keyed(quota));
        entry.value().check_key(&limiter_key).is_err()
    };
    if exceeded {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"success": false, "message": "Too many verification attempts, try again later"})),
        ));
    }

    let Some(verifier) = state.verifier.as_ref() else {
        tracing::error!("captcha verification requested but no credentials are configured");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "message": "reCAPTCHA secret key is not configured."})),
        ));
    };

    let token = payload.token.unwrap_or_default();
    let decision = verifier.verify(&token, payload.action.as_deref()).await;
    if decision.accepted {
        return Ok(Json(json!({"success": true, "score": decision.score})));
    }

    tracing::info!(
        reason = decision.reason.as_str(),
        score = decision.score,
        "captcha verification rejected"
    );
    let status = match decision.reason {
        DecisionReason::UpstreamUnreachable => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    };
    let mut body = json!({"success": false, "message": decision.message});
    if !decision.reason_codes.is_empty() {
        body["errors"] = json!(decision.reason_codes);
    }
    if decision.reason == DecisionReason::LowScore {
        body["score"] = json!(decision.score);
    }
    Err((status, Json(body)))
}
