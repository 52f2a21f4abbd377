use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{CaptchaConfig, CaptchaProvider};

/// Action label bound into contact-form tokens when the caller declares none.
pub const DEFAULT_EXPECTED_ACTION: &str = "contact_submit";
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    Accepted,
    MissingToken,
    UpstreamUnreachable,
    Invalid,
    ActionMismatch,
    LowScore,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::Accepted => "accepted",
            DecisionReason::MissingToken => "missing_token",
            DecisionReason::UpstreamUnreachable => "upstream_unreachable",
            DecisionReason::Invalid => "invalid",
            DecisionReason::ActionMismatch => "action_mismatch",
            DecisionReason::LowScore => "low_score",
        }
    }
}

/// Normalized accept/reject answer derived from the verification service.
/// Rejection is an expected outcome here, not a fault; every reachable
/// upstream answer becomes one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationDecision {
    pub accepted: bool,
    /// Risk score reported by the service; 0 when the service sent none.
    pub score: f64,
    pub reason: DecisionReason,
    /// Provider-supplied error/invalid-reason codes, for diagnostics.
    pub reason_codes: Vec<String>,
    /// Human-readable explanation suitable for display.
    pub message: String,
}

impl VerificationDecision {
    fn accepted(score: f64) -> Self {
        Self {
            accepted: true,
            score,
            reason: DecisionReason::Accepted,
            reason_codes: Vec::new(),
            message: String::new(),
        }
    }

    fn rejected(
        reason: DecisionReason,
        score: f64,
        reason_codes: Vec<String>,
        message: &str,
    ) -> Self {
        Self {
            accepted: false,
            score,
            reason,
            reason_codes,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(reqwest::Error),
    #[error("verification service returned status {0}")]
    Status(u16),
    #[error("could not decode verification response: {0}")]
    Decode(reqwest::Error),
}

/// What both upstream styles reduce to before a decision is made.
struct UpstreamAnswer {
    success: bool,
    score: Option<f64>,
    action: Option<String>,
    codes: Vec<String>,
}

#[derive(Deserialize)]
struct SiteverifyResponse {
    success: bool,
    score: Option<f64>,
    action: Option<String>,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

#[derive(Serialize)]
struct AssessmentEvent<'a> {
    token: &'a str,
    #[serde(rename = "siteKey")]
    site_key: &'a str,
    #[serde(rename = "expectedAction")]
    expected_action: &'a str,
}

#[derive(Serialize)]
struct AssessmentRequest<'a> {
    event: AssessmentEvent<'a>,
}

#[derive(Deserialize, Default)]
struct TokenProperties {
    #[serde(default)]
    valid: bool,
    action: Option<String>,
    #[serde(rename = "invalidReason")]
    invalid_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct RiskAnalysis {
    score: Option<f64>,
    #[serde(default)]
    reasons: Vec<String>,
}

#[derive(Deserialize)]
struct AssessmentResponse {
    #[serde(rename = "tokenProperties", default)]
    token_properties: TokenProperties,
    #[serde(rename = "riskAnalysis", default)]
    risk_analysis: RiskAnalysis,
}

/// Forwards proof tokens to the configured verification service and
/// normalizes the answer into a [`VerificationDecision`].
pub struct CaptchaVerifier {
    client: Client,
    config: CaptchaConfig,
}

impl CaptchaVerifier {
    pub fn new(config: CaptchaConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Verify one token against the declared action. An empty token fails
    /// fast without a network call.
    pub async fn verify(&self, token: &str, expected_action: Option<&str>) -> VerificationDecision {
        if token.trim().is_empty() {
            return VerificationDecision::rejected(
                DecisionReason::MissingToken,
                0.0,
                Vec::new(),
                "reCAPTCHA token not found.",
            );
        }
        let expected = expected_action.unwrap_or(&self.config.expected_action);

        let answer = match &self.config.provider {
            CaptchaProvider::Checkbox { secret, verify_url } => {
                self.call_siteverify(verify_url, secret, token).await
            }
            CaptchaProvider::Enterprise {
                site_key,
                api_key,
                project_id,
                api_url,
            } => {
                self.call_enterprise(api_url, project_id, api_key, site_key, token, expected)
                    .await
            }
        };

        let answer = match answer {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("reCAPTCHA verification call failed: {}", e);
                return VerificationDecision::rejected(
                    DecisionReason::UpstreamUnreachable,
                    0.0,
                    Vec::new(),
                    "Connection to the reCAPTCHA verification service failed.",
                );
            }
        };

        self.decide(answer, expected)
    }

    fn decide(&self, answer: UpstreamAnswer, expected: &str) -> VerificationDecision {
        // Missing score counts as zero: an answer without one never clears a
        // positive threshold.
        let score = answer.score.unwrap_or(0.0);

        if !answer.success {
            return VerificationDecision::rejected(
                DecisionReason::Invalid,
                score,
                answer.codes,
                "reCAPTCHA verification failed. Please wait a moment and try again.",
            );
        }
        if let Some(action) = &answer.action {
            if action != expected {
                return VerificationDecision::rejected(
                    DecisionReason::ActionMismatch,
                    score,
                    answer.codes,
                    "reCAPTCHA action did not match.",
                );
            }
        }
        if score < self.config.score_threshold {
            return VerificationDecision::rejected(
                DecisionReason::LowScore,
                score,
                answer.codes,
                "reCAPTCHA score was below the threshold. Please try again later.",
            );
        }
        VerificationDecision::accepted(score)
    }

    async fn call_siteverify(
        &self,
        verify_url: &str,
        secret: &str,
        token: &str,
    ) -> Result<UpstreamAnswer, UpstreamError> {
        let params = [("secret", secret), ("response", token)];
        let response = self
            .client
            .post(verify_url)
            .form(&params)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }
        let body: SiteverifyResponse = response.json().await.map_err(UpstreamError::Decode)?;
        Ok(UpstreamAnswer {
            success: body.success,
            score: body.score,
            action: body.action,
            codes: body.error_codes,
        })
    }

    async fn call_enterprise(
        &self,
        api_url: &str,
        project_id: &str,
        api_key: &str,
        site_key: &str,
        token: &str,
        expected: &str,
    ) -> Result<UpstreamAnswer, UpstreamError> {
        let url = format!(
            "{}/v1/projects/{}/assessments?key={}",
            api_url.trim_end_matches('/'),
            project_id,
            api_key
        );
        let body = AssessmentRequest {
            event: AssessmentEvent {
                token,
                site_key,
                expected_action: expected,
            },
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }
        let body: AssessmentResponse = response.json().await.map_err(UpstreamError::Decode)?;
        let mut codes = Vec::new();
        if let Some(reason) = body.token_properties.invalid_reason {
            codes.push(reason);
        }
        codes.extend(body.risk_analysis.reasons);
        Ok(UpstreamAnswer {
            success: body.token_properties.valid,
            score: body.risk_analysis.score,
            action: body.token_properties.action,
            codes,
        })
    }
}
