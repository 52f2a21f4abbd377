use std::collections::BTreeSet;
use std::env;

use thiserror::Error;

use crate::captcha::verifier::{DEFAULT_EXPECTED_ACTION, DEFAULT_SCORE_THRESHOLD};
use crate::form::fields::{FieldName, RequiredFieldPolicy};

const DEFAULT_SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
const DEFAULT_ENTERPRISE_API_URL: &str = "https://recaptchaenterprise.googleapis.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("no captcha credentials configured: set SITE_RECAPTCHA_SECRET or the RECAPTCHA_ENTERPRISE_* variables")]
    MissingCaptchaCredentials,
}

/// Which verification backend is in use, selected by the credentials present
/// in the environment. Enterprise credentials win when both are set.
#[derive(Debug, Clone)]
pub enum CaptchaProvider {
    /// Checkbox-style challenge verified with a shared secret.
    Checkbox { secret: String, verify_url: String },
    /// Score-based enterprise assessment keyed by site key + API key.
    Enterprise {
        site_key: String,
        api_key: String,
        project_id: String,
        api_url: String,
    },
}

#[derive(Debug, Clone)]
pub struct CaptchaConfig {
    pub provider: CaptchaProvider,
    pub score_threshold: f64,
    pub expected_action: String,
}

impl CaptchaConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = if let (Ok(site_key), Ok(api_key), Ok(project_id)) = (
            env::var("RECAPTCHA_ENTERPRISE_SITE_KEY"),
            env::var("RECAPTCHA_ENTERPRISE_API_KEY"),
            env::var("RECAPTCHA_ENTERPRISE_PROJECT_ID"),
        ) {
            CaptchaProvider::Enterprise {
                site_key,
                api_key,
                project_id,
                api_url: env::var("RECAPTCHA_ENTERPRISE_API_URL")
                    .unwrap_or_else(|_| DEFAULT_ENTERPRISE_API_URL.to_string()),
            }
        } else if let Ok(secret) = env::var("SITE_RECAPTCHA_SECRET") {
            CaptchaProvider::Checkbox {
                secret,
                verify_url: env::var("RECAPTCHA_VERIFY_URL")
                    .unwrap_or_else(|_| DEFAULT_SITEVERIFY_URL.to_string()),
            }
        } else {
            return Err(ConfigError::MissingCaptchaCredentials);
        };

        let score_threshold = match env::var("RECAPTCHA_SCORE_THRESHOLD") {
            Ok(raw) => raw.parse::<f64>().map_err(|e| ConfigError::Invalid {
                var: "RECAPTCHA_SCORE_THRESHOLD",
                reason: e.to_string(),
            })?,
            Err(_) => DEFAULT_SCORE_THRESHOLD,
        };

        Ok(Self {
            provider,
            score_threshold,
            expected_action: env::var("RECAPTCHA_EXPECTED_ACTION")
                .unwrap_or_else(|_| DEFAULT_EXPECTED_ACTION.to_string()),
        })
    }
}

/// Where accepted submissions are relayed to.
#[derive(Debug, Clone)]
pub struct FormsConfig {
    pub endpoint: String,
    pub form_name: String,
}

impl FormsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env::var("FORMS_ENDPOINT").map_err(|_| ConfigError::MissingVar("FORMS_ENDPOINT"))?,
            form_name: env::var("FORM_NAME").unwrap_or_else(|_| "contact".to_string()),
        })
    }
}

/// Analytics is optional end to end; leaving the collector unset turns the
/// reporter into a logging no-op.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfig {
    pub collector_url: Option<String>,
    pub ads_id: Option<String>,
}

impl AnalyticsConfig {
    pub fn from_env() -> Self {
        Self {
            collector_url: env::var("ANALYTICS_COLLECTOR_URL").ok(),
            ads_id: env::var("ADS_CONVERSION_ID").ok(),
        }
    }
}

/// Required-field membership for the contact form, read from
/// `CONTACT_REQUIRED_FIELDS` (comma-separated wire names) and
/// `CONTACT_MESSAGE_REQUIRED_FOR_OTHER`. Defaults to company, name, email
/// and message with phone optional.
pub fn contact_policy_from_env() -> Result<RequiredFieldPolicy, ConfigError> {
    let message_for_other = matches!(
        env::var("CONTACT_MESSAGE_REQUIRED_FOR_OTHER").as_deref(),
        Ok("1") | Ok("true")
    );
    match env::var("CONTACT_REQUIRED_FIELDS") {
        Ok(raw) => {
            let mut base = BTreeSet::new();
            for name in raw.split(',').filter(|s| !s.trim().is_empty()) {
                let field = FieldName::parse(name).ok_or_else(|| ConfigError::Invalid {
                    var: "CONTACT_REQUIRED_FIELDS",
                    reason: format!("unknown field name {:?}", name.trim()),
                })?;
                base.insert(field);
            }
            Ok(RequiredFieldPolicy::new(base, message_for_other))
        }
        Err(_) if message_for_other => {
            // default base minus message, which becomes conditional
            let base = [FieldName::Company, FieldName::Name, FieldName::Email]
                .into_iter()
                .collect();
            Ok(RequiredFieldPolicy::new(base, true))
        }
        Err(_) => Ok(RequiredFieldPolicy::default()),
    }
}
