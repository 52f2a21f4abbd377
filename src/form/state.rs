use std::collections::BTreeSet;

use crate::form::fields::{ConsultationType, ContactFields, FieldName, RequiredFieldPolicy};
use crate::form::validator::{self, ValidationResult, REQUIRED_FIELD_MESSAGE};

/// Result of a submission attempt. Created when an attempt starts and
/// discarded with the page session; nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Pending,
    Succeeded,
    Failed(String),
}

/// Holds the form's values plus the touched/error bookkeeping that drives
/// inline feedback. Validation itself lives in [`validator`]; this type only
/// applies it at the right moments.
#[derive(Debug, Default)]
pub struct FormState {
    pub fields: ContactFields,
    honeypot: String,
    touched: BTreeSet<FieldName>,
    errors: ValidationResult,
    captcha_error: Option<String>,
    outcome: Option<SubmissionOutcome>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update a field value. Once a field has been touched, edits revalidate
    /// it immediately so the error clears as soon as the value is fixed.
    pub fn set_field(&mut self, field: FieldName, value: &str, policy: &RequiredFieldPolicy) {
        match field {
            FieldName::Company => self.fields.company = value.to_string(),
            FieldName::Name => self.fields.name = value.to_string(),
            FieldName::Email => self.fields.email = value.to_string(),
            FieldName::Phone => self.fields.phone = value.to_string(),
            FieldName::ConsultationType => {
                self.fields.consultation_type = ConsultationType::parse(value)
            }
            FieldName::Message => self.fields.message = value.to_string(),
        }
        if self.touched.contains(&field) {
            self.validate_field(field, policy);
        }
    }

    /// Blur semantics: mark the field touched and validate it.
    pub fn touch(&mut self, field: FieldName, policy: &RequiredFieldPolicy) {
        self.touched.insert(field);
        self.validate_field(field, policy);
    }

    fn validate_field(&mut self, field: FieldName, policy: &RequiredFieldPolicy) {
        let required = policy.effective_for(&self.fields);
        if required.contains(&field) && self.fields.value_of(field).trim().is_empty() {
            self.errors.insert(field, REQUIRED_FIELD_MESSAGE.to_string());
        } else {
            self.errors.remove(&field);
        }
    }

    /// Exhaustive validation on a submit attempt. Marks every required field
    /// touched and replaces the error map wholesale, so errors for fields no
    /// longer required are dropped. Returns whether the form is valid.
    pub fn validate_all(&mut self, policy: &RequiredFieldPolicy) -> bool {
        let required = policy.effective_for(&self.fields);
        self.touched.extend(required.iter().copied());
        self.errors = validator::validate(&self.fields, &required);
        self.errors.is_empty()
    }

    /// Restore the initial empty form. The submission outcome is left alone;
    /// the caller transitions it after a successful reset.
    pub fn reset(&mut self) {
        self.fields = ContactFields::default();
        self.honeypot.clear();
        self.touched.clear();
        self.errors.clear();
        self.captcha_error = None;
    }

    pub fn errors(&self) -> &ValidationResult {
        &self.errors
    }

    pub fn is_touched(&self, field: FieldName) -> bool {
        self.touched.contains(&field)
    }

    pub fn honeypot(&self) -> &str {
        &self.honeypot
    }

    /// The hidden trap field; real users never fill it.
    pub fn set_honeypot(&mut self, value: &str) {
        self.honeypot = value.to_string();
    }

    pub fn captcha_error(&self) -> Option<&str> {
        self.captcha_error.as_deref()
    }

    pub fn set_captcha_error(&mut self, message: impl Into<String>) {
        self.captcha_error = Some(message.into());
    }

    pub fn clear_captcha_error(&mut self) {
        self.captcha_error = None;
    }

    pub fn outcome(&self) -> Option<&SubmissionOutcome> {
        self.outcome.as_ref()
    }

    pub fn set_outcome(&mut self, outcome: SubmissionOutcome) {
        self.outcome = Some(outcome);
    }

    pub fn clear_outcome(&mut self) {
        self.outcome = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_fields_do_not_validate_on_edit() {
        let policy = RequiredFieldPolicy::default();
        let mut state = FormState::new();
        state.set_field(FieldName::Company, "", &policy);
        assert!(state.errors().is_empty());
    }

    #[test]
    fn blur_flags_empty_required_field_and_edit_clears_it() {
        let policy = RequiredFieldPolicy::default();
        let mut state = FormState::new();

        state.touch(FieldName::Name, &policy);
        assert!(state.errors().contains_key(&FieldName::Name));

        state.set_field(FieldName::Name, "Taro", &policy);
        assert!(!state.errors().contains_key(&FieldName::Name));
    }

    #[test]
    fn validate_all_touches_and_flags_every_required_field() {
        let policy = RequiredFieldPolicy::default();
        let mut state = FormState::new();
        assert!(!state.validate_all(&policy));
        assert_eq!(state.errors().len(), 4);
        assert!(state.is_touched(FieldName::Company));
        assert!(state.is_touched(FieldName::Message));
        assert!(!state.is_touched(FieldName::Phone));
    }

    #[test]
    fn validate_all_passes_with_phone_left_empty() {
        let policy = RequiredFieldPolicy::default();
        let mut state = FormState::new();
        state.set_field(FieldName::Company, "Acme", &policy);
        state.set_field(FieldName::Name, "Taro", &policy);
        state.set_field(FieldName::Email, "a@b.com", &policy);
        state.set_field(FieldName::Message, "hi", &policy);
        assert!(state.validate_all(&policy));
        assert!(state.errors().is_empty());
    }

    #[test]
    fn reset_restores_the_initial_form() {
        let policy = RequiredFieldPolicy::default();
        let mut state = FormState::new();
        state.set_field(FieldName::Company, "Acme", &policy);
        state.touch(FieldName::Email, &policy);
        state.set_captcha_error("expired");
        state.reset();

        assert_eq!(state.fields, ContactFields::default());
        assert!(state.errors().is_empty());
        assert!(!state.is_touched(FieldName::Email));
        assert!(state.captcha_error().is_none());
    }
}
