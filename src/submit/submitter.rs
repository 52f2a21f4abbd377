use reqwest::Client;
use thiserror::Error;

use crate::captcha::widget::ChallengeToken;
use crate::config::FormsConfig;
use crate::form::fields::ContactFields;

/// The one message shown for any delivery failure; the forms backend's
/// failure subtypes are not surfaced to the user.
pub const SUBMIT_FAILED_MESSAGE: &str = "Submission failed. Please wait a moment and try again.";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("forms backend returned status {0}")]
    Status(u16),
    #[error("request to forms backend failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Relays an accepted submission to the forms-processing backend as one
/// form-encoded POST. No response body is interpreted; any 2xx is success.
pub struct FormSubmitter {
    client: Client,
    endpoint: String,
    form_name: String,
}

impl FormSubmitter {
    pub fn new(config: FormsConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint,
            form_name: config.form_name,
        }
    }

    pub async fn submit(
        &self,
        fields: &ContactFields,
        honeypot: &str,
        token: &ChallengeToken,
    ) -> Result<(), SubmitError> {
        let consultation_type = fields.consultation_type.map(|t| t.as_str()).unwrap_or("");
        let form: [(&str, &str); 9] = [
            ("form-name", &self.form_name),
            ("bot-field", honeypot),
            ("company", &fields.company),
            ("name", &fields.name),
            ("email", &fields.email),
            ("phone", &fields.phone),
            ("consultationType", consultation_type),
            ("message", &fields.message),
            ("g-recaptcha-response", token.as_str()),
        ];
        let response = self.client.post(&self.endpoint).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(SubmitError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
