use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

/// The fields of the contact form, identified by their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    Company,
    Name,
    Email,
    Phone,
    ConsultationType,
    Message,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Company => "company",
            FieldName::Name => "name",
            FieldName::Email => "email",
            FieldName::Phone => "phone",
            FieldName::ConsultationType => "consultationType",
            FieldName::Message => "message",
        }
    }

    pub fn parse(value: &str) -> Option<FieldName> {
        match value.trim().to_ascii_lowercase().as_str() {
            "company" => Some(FieldName::Company),
            "name" => Some(FieldName::Name),
            "email" => Some(FieldName::Email),
            "phone" => Some(FieldName::Phone),
            "consultationtype" | "consultation_type" => Some(FieldName::ConsultationType),
            "message" => Some(FieldName::Message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationType {
    Proposal,
    Trial,
    Other,
}

impl ConsultationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::Proposal => "proposal",
            ConsultationType::Trial => "trial",
            ConsultationType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<ConsultationType> {
        match value.trim().to_ascii_lowercase().as_str() {
            "proposal" => Some(ConsultationType::Proposal),
            "trial" => Some(ConsultationType::Trial),
            "other" => Some(ConsultationType::Other),
            _ => None,
        }
    }
}

/// A snapshot of the contact form's values. All fields start empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFields {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub consultation_type: Option<ConsultationType>,
    #[serde(default)]
    pub message: String,
}

impl ContactFields {
    pub fn value_of(&self, field: FieldName) -> &str {
        match field {
            FieldName::Company => &self.company,
            FieldName::Name => &self.name,
            FieldName::Email => &self.email,
            FieldName::Phone => &self.phone,
            FieldName::ConsultationType => {
                self.consultation_type.map(|t| t.as_str()).unwrap_or("")
            }
            FieldName::Message => &self.message,
        }
    }
}

/// Which fields are mandatory. The membership varies across deployments of
/// this form, so it is carried as configuration rather than hard-coded.
///
/// When `message_required_for_other` is set, the message field becomes
/// required only while the consultation type is `other`; the base set is
/// expected to leave `message` out in that mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFieldPolicy {
    base: BTreeSet<FieldName>,
    message_required_for_other: bool,
}

impl RequiredFieldPolicy {
    pub fn new(base: BTreeSet<FieldName>, message_required_for_other: bool) -> Self {
        Self {
            base,
            message_required_for_other,
        }
    }

    /// The required set for a given snapshot of the form.
    pub fn effective_for(&self, fields: &ContactFields) -> BTreeSet<FieldName> {
        let mut required = self.base.clone();
        if self.message_required_for_other
            && fields.consultation_type == Some(ConsultationType::Other)
        {
            required.insert(FieldName::Message);
        }
        required
    }
}

impl Default for RequiredFieldPolicy {
    /// Company, name, email and message required; phone optional.
    fn default() -> Self {
        Self {
            base: [
                FieldName::Company,
                FieldName::Name,
                FieldName::Email,
                FieldName::Message,
            ]
            .into_iter()
            .collect(),
            message_required_for_other: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip() {
        for field in [
            FieldName::Company,
            FieldName::Name,
            FieldName::Email,
            FieldName::Phone,
            FieldName::ConsultationType,
            FieldName::Message,
        ] {
            assert_eq!(FieldName::parse(field.as_str()), Some(field));
        }
        assert_eq!(FieldName::parse("consultation_type"), Some(FieldName::ConsultationType));
        assert_eq!(FieldName::parse("unknown"), None);
    }

    #[test]
    fn default_policy_leaves_phone_optional() {
        let policy = RequiredFieldPolicy::default();
        let required = policy.effective_for(&ContactFields::default());
        assert!(required.contains(&FieldName::Company));
        assert!(required.contains(&FieldName::Message));
        assert!(!required.contains(&FieldName::Phone));
    }

    #[test]
    fn message_required_only_for_other() {
        let base = [FieldName::Company, FieldName::Name, FieldName::Email]
            .into_iter()
            .collect();
        let policy = RequiredFieldPolicy::new(base, true);

        let mut fields = ContactFields::default();
        assert!(!policy.effective_for(&fields).contains(&FieldName::Message));

        fields.consultation_type = Some(ConsultationType::Trial);
        assert!(!policy.effective_for(&fields).contains(&FieldName::Message));

        fields.consultation_type = Some(ConsultationType::Other);
        assert!(policy.effective_for(&fields).contains(&FieldName::Message));
    }
}
