use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use crate::analytics::{AnalyticsReporter, EventName};
use crate::captcha::verifier::CaptchaVerifier;
use crate::captcha::widget::{acquire_token, ChallengeWidget, READY_POLL_INTERVAL};
use crate::form::fields::RequiredFieldPolicy;
use crate::form::state::{FormState, SubmissionOutcome};
use crate::submit::submitter::{FormSubmitter, SUBMIT_FAILED_MESSAGE};

/// Ceiling on how long a finished submission waits for the conversion
/// report before showing success anyway.
pub const CONVERSION_SOFT_TIMEOUT: Duration = Duration::from_millis(1500);
pub const CONVERSION_LABEL: &str = "contact";

/// Clears the advisory submitting flag on every exit path, including early
/// returns partway through an attempt.
struct SubmittingGuard<'a>(&'a AtomicBool);

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives one submission attempt through its strictly sequential chain:
/// validate, acquire a challenge token, verify it, relay the form, then
/// best-effort conversion reporting. One instance per form mount.
pub struct SubmissionPipeline {
    widget: Arc<dyn ChallengeWidget>,
    verifier: CaptchaVerifier,
    submitter: FormSubmitter,
    analytics: Arc<AnalyticsReporter>,
    policy: RequiredFieldPolicy,
    site_key: String,
    action: String,
    conversion_timeout: Duration,
    submitting: AtomicBool,
    mounted: AtomicBool,
    cancel: watch::Sender<bool>,
}

impl SubmissionPipeline {
    pub fn new(
        widget: Arc<dyn ChallengeWidget>,
        verifier: CaptchaVerifier,
        submitter: FormSubmitter,
        analytics: Arc<AnalyticsReporter>,
        policy: RequiredFieldPolicy,
        site_key: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            widget,
            verifier,
            submitter,
            analytics,
            policy,
            site_key: site_key.into(),
            action: action.into(),
            conversion_timeout: CONVERSION_SOFT_TIMEOUT,
            submitting: AtomicBool::new(false),
            mounted: AtomicBool::new(true),
            cancel,
        }
    }

    /// Override the conversion soft timeout.
    pub fn with_conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = timeout;
        self
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Tear-down signal. Pending readiness polls abort and no further state
    /// mutation happens after this returns.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
        let _ = self.cancel.send(true);
    }

    /// Run one attempt. Re-entry while an attempt is in flight is ignored;
    /// the submitting flag is advisory and released on every exit path.
    pub async fn submit_attempt(&self, state: &mut FormState) {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let _guard = SubmittingGuard(&self.submitting);

        self.analytics.track(EventName::FormSubmitStart, json!({}));
        state.clear_captcha_error();

        if !state.honeypot().is_empty() {
            // honeypot tripped: pretend success, touch nothing upstream
            tracing::warn!("contact submission dropped, honeypot field was filled");
            state.set_outcome(SubmissionOutcome::Succeeded);
            return;
        }

        if !state.validate_all(&self.policy) {
            let fields: Vec<&str> = state.errors().keys().map(|f| f.as_str()).collect();
            self.analytics
                .track(EventName::FormValidationError, json!({ "fields": fields }));
            return;
        }
        state.set_outcome(SubmissionOutcome::Pending);

        let mut cancel = self.cancel.subscribe();
        let token = match acquire_token(
            self.widget.as_ref(),
            &self.site_key,
            &self.action,
            READY_POLL_INTERVAL,
            &mut cancel,
        )
        .await
        {
            Ok(token) => token,
            Err(err) => {
                self.analytics.track(
                    EventName::RecaptchaError,
                    json!({ "stage": "acquire", "error": err.to_string() }),
                );
                if self.is_mounted() {
                    state.set_captcha_error(err.user_message());
                    state.clear_outcome();
                }
                return;
            }
        };

        let decision = self
            .verifier
            .verify(token.as_str(), Some(self.action.as_str()))
            .await;
        if !decision.accepted {
            self.analytics.track(
                EventName::RecaptchaError,
                json!({
                    "stage": "verify",
                    "reason": decision.reason.as_str(),
                    "codes": decision.reason_codes,
                    "score": decision.score,
                }),
            );
            if self.is_mounted() {
                state.set_captcha_error(decision.message.clone());
                state.clear_outcome();
            }
            return;
        }

        // no stale-state submission: both gates re-checked right before the POST
        if !decision.accepted || !state.validate_all(&self.policy) {
            state.clear_outcome();
            return;
        }

        if let Err(err) = self
            .submitter
            .submit(&state.fields, state.honeypot(), &token)
            .await
        {
            tracing::error!("forms backend submission failed: {}", err);
            self.analytics
                .track(EventName::FormSubmitFail, json!({ "error": err.to_string() }));
            if self.is_mounted() {
                state.set_outcome(SubmissionOutcome::Failed(SUBMIT_FAILED_MESSAGE.to_string()));
            }
            return;
        }

        self.analytics
            .track(EventName::FormSubmitSuccess, json!({ "score": decision.score }));

        // Best-effort conversion report: whichever of the report and the
        // timer finishes first lets the success state through.
        let conversion = self.analytics.send_conversion(CONVERSION_LABEL, json!({}));
        tokio::select! {
            _ = conversion => {}
            _ = tokio::time::sleep(self.conversion_timeout) => {
                tracing::debug!("conversion report outlived its soft timeout, finalizing anyway");
            }
        }

        if self.is_mounted() {
            state.reset();
            state.set_outcome(SubmissionOutcome::Succeeded);
        }
    }
}
