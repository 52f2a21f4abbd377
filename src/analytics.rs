use std::collections::HashSet;
use std::sync::Mutex;

use reqwest::Client;
use serde_json::{json, Value};

use crate::config::AnalyticsConfig;

/// Structured event names fired along the contact flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    FormStart,
    ConsultationTypeSelect,
    FormSubmitStart,
    FormValidationError,
    FormSubmitFail,
    FormSubmitSuccess,
    RecaptchaError,
    AdsConversion,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::FormStart => "form_start",
            EventName::ConsultationTypeSelect => "consultation_type_select",
            EventName::FormSubmitStart => "form_submit_start",
            EventName::FormValidationError => "form_validation_error",
            EventName::FormSubmitFail => "form_submit_fail",
            EventName::FormSubmitSuccess => "form_submit_success",
            EventName::RecaptchaError => "recaptcha_error",
            EventName::AdsConversion => "ads_conversion",
        }
    }
}

/// Fire-and-forget event reporter. Delivery failures are suppressed: nothing
/// here may throw or block the submission flow. The once-keys live on the
/// instance and last for its lifetime (one page session), not in a global.
pub struct AnalyticsReporter {
    client: Client,
    collector_url: Option<String>,
    ads_id: Option<String>,
    seen: Mutex<HashSet<String>>,
}

impl AnalyticsReporter {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            client: Client::new(),
            collector_url: config.collector_url,
            ads_id: config.ads_id,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// A reporter with no collector; events only reach the debug log.
    pub fn disabled() -> Self {
        Self::new(AnalyticsConfig::default())
    }

    /// Emit one event. Returns immediately; delivery happens in the
    /// background and failures are logged at debug level only.
    pub fn track(&self, event: EventName, params: Value) {
        let payload = with_event(event.as_str(), params);
        let Some(url) = self.collector_url.clone() else {
            tracing::debug!("analytics disabled, dropping event {}", event.as_str());
            return;
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.post(&url).json(&payload).send().await {
                tracing::debug!("analytics delivery failed: {}", e);
            }
        });
    }

    /// Emit at most once per `key` for the lifetime of this reporter.
    pub fn track_once(&self, key: &str, event: EventName, params: Value) {
        let inserted = self
            .seen
            .lock()
            .expect("analytics once-key set poisoned")
            .insert(key.to_string());
        if inserted {
            self.track(event, params);
        }
    }

    pub fn has_tracked(&self, key: &str) -> bool {
        self.seen
            .lock()
            .expect("analytics once-key set poisoned")
            .contains(key)
    }

    /// Report a conversion and wait for delivery. Callers race this against
    /// a soft timeout; failures are still suppressed, so awaiting it can
    /// only delay, never fail.
    pub async fn send_conversion(&self, label: &str, params: Value) {
        let Some(ads_id) = &self.ads_id else {
            tracing::debug!("no ads conversion id configured, dropping conversion {}", label);
            return;
        };
        let Some(url) = &self.collector_url else {
            tracing::debug!("analytics disabled, dropping conversion {}", label);
            return;
        };
        let mut payload = with_event(EventName::AdsConversion.as_str(), params);
        payload["send_to"] = json!(format!("{}/{}", ads_id, label));
        if let Err(e) = self.client.post(url).json(&payload).send().await {
            tracing::debug!("conversion delivery failed: {}", e);
        }
    }
}

fn with_event(event: &str, params: Value) -> Value {
    match params {
        Value::Object(mut map) => {
            map.insert("event".to_string(), json!(event));
            Value::Object(map)
        }
        Value::Null => json!({ "event": event }),
        other => json!({ "event": event, "params": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_once_marks_the_key_exactly_once() {
        let reporter = AnalyticsReporter::disabled();
        assert!(!reporter.has_tracked("form_visible"));
        reporter.track_once("form_visible", EventName::FormStart, json!({}));
        assert!(reporter.has_tracked("form_visible"));
        // second call with the same key is a no-op
        reporter.track_once("form_visible", EventName::FormStart, json!({}));
        assert!(reporter.has_tracked("form_visible"));
    }

    #[test]
    fn payloads_carry_the_event_name() {
        let payload = with_event("form_submit_success", json!({ "score": 0.9 }));
        assert_eq!(payload["event"], "form_submit_success");
        assert_eq!(payload["score"], 0.9);

        let bare = with_event("form_start", Value::Null);
        assert_eq!(bare["event"], "form_start");
    }

    #[tokio::test]
    async fn disabled_reporter_never_blocks_or_panics() {
        let reporter = AnalyticsReporter::disabled();
        reporter.track(EventName::FormSubmitStart, json!({}));
        reporter.send_conversion("contact", json!({})).await;
    }
}
