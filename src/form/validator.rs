use std::collections::{BTreeMap, BTreeSet};

use crate::form::fields::{ContactFields, FieldName};

/// One generic message for every required field, matching the form's single
/// undifferentiated error string.
pub const REQUIRED_FIELD_MESSAGE: &str = "This field is required.";

/// Field name mapped to the error shown for it; absence means valid.
pub type ValidationResult = BTreeMap<FieldName, String>;

/// Checks that every required field is non-empty after trimming. Fields
/// outside `required` are never flagged, so calling with a narrower set
/// clears any error a previous configuration produced.
pub fn validate(fields: &ContactFields, required: &BTreeSet<FieldName>) -> ValidationResult {
    let mut errors = ValidationResult::new();
    for &field in required {
        if fields.value_of(field).trim().is_empty() {
            errors.insert(field, REQUIRED_FIELD_MESSAGE.to_string());
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(fields: &[FieldName]) -> BTreeSet<FieldName> {
        fields.iter().copied().collect()
    }

    #[test]
    fn empty_required_fields_are_flagged() {
        let mut fields = ContactFields::default();
        fields.company = "Acme".into();
        let errors = validate(
            &fields,
            &required(&[FieldName::Company, FieldName::Name, FieldName::Email]),
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get(&FieldName::Name).map(String::as_str), Some(REQUIRED_FIELD_MESSAGE));
        assert_eq!(errors.get(&FieldName::Email).map(String::as_str), Some(REQUIRED_FIELD_MESSAGE));
        assert!(!errors.contains_key(&FieldName::Company));
    }

    #[test]
    fn whitespace_only_counts_as_empty() {
        let mut fields = ContactFields::default();
        fields.name = "   ".into();
        let errors = validate(&fields, &required(&[FieldName::Name]));
        assert!(errors.contains_key(&FieldName::Name));
    }

    #[test]
    fn optional_fields_are_never_flagged() {
        let fields = ContactFields::default();
        let errors = validate(&fields, &required(&[FieldName::Company]));
        assert!(!errors.contains_key(&FieldName::Phone));
        assert!(!errors.contains_key(&FieldName::Message));
    }

    #[test]
    fn narrower_required_set_clears_stale_errors() {
        let fields = ContactFields::default();
        let wide = validate(&fields, &required(&[FieldName::Company, FieldName::Phone]));
        assert!(wide.contains_key(&FieldName::Phone));

        let narrow = validate(&fields, &required(&[FieldName::Company]));
        assert!(!narrow.contains_key(&FieldName::Phone));
    }

    #[test]
    fn validation_is_pure() {
        let mut fields = ContactFields::default();
        fields.email = "a@b.com".into();
        let set = required(&[FieldName::Company, FieldName::Email]);
        assert_eq!(validate(&fields, &set), validate(&fields, &set));
    }
}
