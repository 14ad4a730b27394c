use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::anchored_pattern;

/// The kind of input a field asks for.
///
/// Closed over the kinds the form knows how to render, with an explicit
/// [`FieldKind::Unknown`] arm so a schema extension from a newer backend
/// degrades to a plain text input instead of failing the whole form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Date,
    Checkbox,
    MultilineText,
    SingleSelect,
    Unknown(String),
}

impl FieldKind {
    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Phone => "tel",
            FieldKind::Date => "date",
            FieldKind::Checkbox => "checkbox",
            FieldKind::MultilineText => "textarea",
            FieldKind::SingleSelect => "select",
            FieldKind::Unknown(raw) => raw,
        }
    }

    pub fn is_checkbox(&self) -> bool {
        matches!(self, FieldKind::Checkbox)
    }
}

impl From<String> for FieldKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "text" => FieldKind::Text,
            "email" => FieldKind::Email,
            "tel" | "phone" => FieldKind::Phone,
            "date" => FieldKind::Date,
            "checkbox" => FieldKind::Checkbox,
            "textarea" | "multiline-text" => FieldKind::MultilineText,
            "select" | "single-select" => FieldKind::SingleSelect,
            _ => FieldKind::Unknown(raw),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Declarative constraints attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

/// One form field as described by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,
    /// Marks the single field that carries the legal (GDPR) consent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_consent: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            label: label.into(),
            required: false,
            placeholder: None,
            options: None,
            validation: None,
            is_consent: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_validation(mut self, rule: ValidationRule) -> Self {
        self.validation = Some(rule);
        self
    }

    pub fn consent(mut self) -> Self {
        self.is_consent = true;
        self
    }

    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("field #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("field name '{0}' appears more than once")]
    DuplicateName(String),

    #[error("select field '{0}' has no options")]
    MissingOptions(String),

    #[error("field '{field}' has an invalid pattern: {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("field '{field}' has minLength {min} greater than maxLength {max}")]
    InvertedBounds { field: String, min: usize, max: usize },

    #[error("schema flags more than one consent field ({0:?})")]
    MultipleConsentFields(Vec<String>),
}

/// The ordered field list plus metadata, fetched once per form session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    pub fields: Vec<FieldDescriptor>,
    pub version: String,
    pub last_updated: String,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The field the schema itself declares as the consent field, if any.
    pub fn consent_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.is_consent)
    }

    /// Checks the structural invariants a schema must hold before it can be
    /// compiled: unique non-empty names, options on selects, compilable
    /// patterns, sane length bounds, at most one consent field.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for (index, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyName { index });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateName(field.name.clone()));
            }
            if field.kind == FieldKind::SingleSelect && field.options().is_empty() {
                return Err(SchemaError::MissingOptions(field.name.clone()));
            }
            if let Some(rule) = &field.validation {
                if let Some(pattern) = &rule.pattern {
                    anchored_pattern(pattern).map_err(|reason| SchemaError::InvalidPattern {
                        field: field.name.clone(),
                        reason,
                    })?;
                }
                if let (Some(min), Some(max)) = (rule.min_length, rule.max_length) {
                    if min > max {
                        return Err(SchemaError::InvertedBounds {
                            field: field.name.clone(),
                            min,
                            max,
                        });
                    }
                }
            }
        }

        let consent: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.is_consent)
            .map(|f| f.name.clone())
            .collect();
        if consent.len() > 1 {
            return Err(SchemaError::MultipleConsentFields(consent));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(fields: Vec<FieldDescriptor>) -> FormSchema {
        FormSchema {
            fields,
            version: "1.0".to_string(),
            last_updated: "2025-08-09T10:00:00".to_string(),
        }
    }

    #[test]
    fn test_deserialize_backend_payload() {
        let json = r#"{
            "fields": [
                {"name": "prenom", "type": "text", "label": "Prénom", "required": true, "placeholder": "Votre prénom"},
                {"name": "telephone", "type": "tel", "label": "Téléphone", "required": false},
                {"name": "poste", "type": "select", "label": "Poste", "required": false, "options": ["Dev", "Ops"]},
                {"name": "bio", "type": "textarea", "label": "Bio", "required": false,
                 "validation": {"minLength": 10, "maxLength": 500}},
                {"name": "rgpd_consent", "type": "checkbox", "label": "J'accepte", "required": true}
            ],
            "version": "1.0",
            "last_updated": "2025-08-09T10:00:00"
        }"#;
        let schema: FormSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.fields.len(), 5);
        assert_eq!(schema.fields[1].kind, FieldKind::Phone);
        assert_eq!(schema.fields[2].options(), ["Dev", "Ops"]);
        assert_eq!(
            schema.fields[3].validation.as_ref().unwrap().min_length,
            Some(10)
        );
        assert!(schema.fields[4].kind.is_checkbox());
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_unknown_kind_is_kept_not_rejected() {
        let json = r#"{"name": "site", "type": "url", "label": "Site web"}"#;
        let field: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(field.kind, FieldKind::Unknown("url".to_string()));
        assert!(!field.required);
    }

    #[test]
    fn test_kind_serializes_back_to_wire_name() {
        let field = FieldDescriptor::new("bio", FieldKind::MultilineText, "Bio");
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value["type"], "textarea");
        assert!(value.get("is_consent").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let s = schema(vec![
            FieldDescriptor::new("email", FieldKind::Email, "Email"),
            FieldDescriptor::new("email", FieldKind::Text, "Email bis"),
        ]);
        assert_eq!(
            s.validate(),
            Err(SchemaError::DuplicateName("email".to_string()))
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let s = schema(vec![FieldDescriptor::new(" ", FieldKind::Text, "Vide")]);
        assert_eq!(s.validate(), Err(SchemaError::EmptyName { index: 0 }));
    }

    #[test]
    fn test_select_without_options_rejected() {
        let s = schema(vec![FieldDescriptor::new(
            "poste",
            FieldKind::SingleSelect,
            "Poste",
        )]);
        assert!(matches!(s.validate(), Err(SchemaError::MissingOptions(_))));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let s = schema(vec![FieldDescriptor::new("code", FieldKind::Text, "Code")
            .with_validation(ValidationRule {
                pattern: Some("[a-z".to_string()),
                ..Default::default()
            })]);
        assert!(matches!(
            s.validate(),
            Err(SchemaError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_two_consent_fields_rejected() {
        let s = schema(vec![
            FieldDescriptor::new("a", FieldKind::Checkbox, "A").consent(),
            FieldDescriptor::new("b", FieldKind::Checkbox, "B").consent(),
        ]);
        assert!(matches!(
            s.validate(),
            Err(SchemaError::MultipleConsentFields(_))
        ));
    }
}
