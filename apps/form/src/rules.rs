//! Validation rule compiler.
//!
//! Turns a field's declarative constraints into an ordered list of pure
//! checks. The order of `CompiledField::checks` is the precedence order used
//! when more than one check fails: required, pattern, minLength, maxLength,
//! options.

use std::collections::BTreeMap;

use regex::Regex;
use regex_syntax::hir::{Hir, Look};

use crate::messages;
use crate::schema::{FieldDescriptor, FieldKind, FormSchema, SchemaError};
use crate::values::{FieldValue, FormValues};

/// Field name → the one message currently shown for that field.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Pass,
    Fail(String),
}

impl CheckOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, CheckOutcome::Pass)
    }
}

#[derive(Debug, Clone)]
pub enum Check {
    Required { message: String },
    Pattern { regex: Regex, message: String },
    MinLength { min: usize, message: String },
    MaxLength { max: usize, message: String },
    OneOf { options: Vec<String>, message: String },
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::Required { .. } => "required",
            Check::Pattern { .. } => "pattern",
            Check::MinLength { .. } => "minLength",
            Check::MaxLength { .. } => "maxLength",
            Check::OneOf { .. } => "options",
        }
    }

    /// Evaluates the check against the field's current value. `None` means the
    /// field was never touched.
    pub fn evaluate(&self, value: Option<&FieldValue>) -> CheckOutcome {
        let empty = value.map_or(true, FieldValue::is_empty);

        if let Check::Required { message } = self {
            return if empty {
                CheckOutcome::Fail(message.clone())
            } else {
                CheckOutcome::Pass
            };
        }

        // Emptiness is governed by `required` alone.
        let Some(value) = value.filter(|_| !empty) else {
            return CheckOutcome::Pass;
        };
        let text = value.as_text();

        let passed = match self {
            Check::Required { .. } => unreachable!("handled above"),
            Check::Pattern { regex, .. } => regex.is_match(&text),
            Check::MinLength { min, .. } => text.chars().count() >= *min,
            Check::MaxLength { max, .. } => text.chars().count() <= *max,
            Check::OneOf { options, .. } => options.iter().any(|o| o.as_str() == text),
        };

        if passed {
            CheckOutcome::Pass
        } else {
            CheckOutcome::Fail(self.message().to_string())
        }
    }

    fn message(&self) -> &str {
        match self {
            Check::Required { message }
            | Check::Pattern { message, .. }
            | Check::MinLength { message, .. }
            | Check::MaxLength { message, .. }
            | Check::OneOf { message, .. } => message,
        }
    }
}

/// All checks for one field, in precedence order.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub checks: Vec<Check>,
}

impl CompiledField {
    /// Runs every check and returns each failure with the check's name.
    pub fn failures(&self, value: Option<&FieldValue>) -> Vec<(&'static str, String)> {
        self.checks
            .iter()
            .filter_map(|check| match check.evaluate(value) {
                CheckOutcome::Pass => None,
                CheckOutcome::Fail(message) => Some((check.name(), message)),
            })
            .collect()
    }

    /// The single message to surface for this field, if any check fails.
    pub fn first_error(&self, value: Option<&FieldValue>) -> Option<String> {
        self.failures(value).into_iter().next().map(|(_, m)| m)
    }
}

/// Compiles `pattern` so it only matches a whole value.
///
/// Anchors are added to the parsed expression rather than to the source text,
/// so flags such as `(?x)` with trailing comments keep their meaning.
pub fn anchored_pattern(pattern: &str) -> Result<Regex, String> {
    let hir = regex_syntax::Parser::new()
        .parse(pattern)
        .map_err(|e| e.to_string())?;
    let anchored = Hir::concat(vec![Hir::look(Look::Start), hir, Hir::look(Look::End)]);
    Regex::new(&anchored.to_string()).map_err(|e| e.to_string())
}

/// Compiles one descriptor. Patterns are anchored so they must match the
/// whole value, never a substring.
pub fn compile(field: &FieldDescriptor) -> Result<CompiledField, SchemaError> {
    let mut checks = Vec::new();
    let label = field.label.as_str();

    if field.required {
        checks.push(Check::Required {
            message: messages::required(label),
        });
    }

    if let Some(rule) = &field.validation {
        if let Some(pattern) = &rule.pattern {
            let regex =
                anchored_pattern(pattern).map_err(|reason| SchemaError::InvalidPattern {
                    field: field.name.clone(),
                    reason,
                })?;
            checks.push(Check::Pattern {
                regex,
                message: messages::invalid_format(label),
            });
        }
        if let Some(min) = rule.min_length {
            checks.push(Check::MinLength {
                min,
                message: messages::too_short(label, min),
            });
        }
        if let Some(max) = rule.max_length {
            checks.push(Check::MaxLength {
                max,
                message: messages::too_long(label, max),
            });
        }
    }

    if field.kind == FieldKind::SingleSelect {
        checks.push(Check::OneOf {
            options: field.options().to_vec(),
            message: messages::not_an_option(label),
        });
    }

    Ok(CompiledField {
        name: field.name.clone(),
        label: field.label.clone(),
        kind: field.kind.clone(),
        required: field.required,
        checks,
    })
}

/// A whole schema compiled once per session.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    fields: Vec<CompiledField>,
}

impl CompiledSchema {
    pub fn compile(schema: &FormSchema) -> Result<Self, SchemaError> {
        schema.validate()?;
        let fields = schema
            .fields
            .iter()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fields })
    }

    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    /// Validates every field in the schema against `values`.
    pub fn validate(&self, values: &FormValues) -> FieldErrors {
        self.fields
            .iter()
            .filter_map(|field| {
                field
                    .first_error(values.get(&field.name))
                    .map(|message| (field.name.clone(), message))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValidationRule;

    fn text(s: &str) -> FieldValue {
        FieldValue::text(s)
    }

    fn rule(pattern: Option<&str>, min: Option<usize>, max: Option<usize>) -> ValidationRule {
        ValidationRule {
            pattern: pattern.map(String::from),
            min_length: min,
            max_length: max,
        }
    }

    #[test]
    fn test_verbose_pattern_compiles_and_stays_anchored() {
        let schema = FormSchema {
            fields: vec![FieldDescriptor::new("code", FieldKind::Text, "Code")
                .with_validation(rule(Some("(?x)[0-9]+ # digits"), None, None))],
            version: "1".into(),
            last_updated: String::new(),
        };
        schema.validate().unwrap();
        let compiled = CompiledSchema::compile(&schema).unwrap();
        let field = compiled.field("code").unwrap();
        assert!(field.first_error(Some(&text("2025"))).is_none());
        assert!(field.first_error(Some(&text("20a25"))).is_some());
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let regex = anchored_pattern("a|ab").unwrap();
        assert!(regex.is_match("ab"));
        assert!(!regex.is_match("abc"));
        assert!(!regex.is_match("xab"));
    }

    #[test]
    fn test_required_fails_on_missing_and_empty() {
        let field = compile(&FieldDescriptor::new("nom", FieldKind::Text, "Nom").required()).unwrap();
        assert_eq!(field.first_error(None).as_deref(), Some("Nom est obligatoire"));
        assert_eq!(
            field.first_error(Some(&text(""))).as_deref(),
            Some("Nom est obligatoire")
        );
        assert!(field.first_error(Some(&text("Doe"))).is_none());
    }

    #[test]
    fn test_required_checkbox_fails_when_unchecked() {
        let field = compile(
            &FieldDescriptor::new("rgpd_consent", FieldKind::Checkbox, "Consentement").required(),
        )
        .unwrap();
        assert!(field.first_error(Some(&FieldValue::Bool(false))).is_some());
        assert!(field.first_error(Some(&FieldValue::Bool(true))).is_none());
    }

    #[test]
    fn test_pattern_is_anchored() {
        let field = compile(
            &FieldDescriptor::new("code", FieldKind::Text, "Code")
                .with_validation(rule(Some("[0-9]{5}"), None, None)),
        )
        .unwrap();
        assert!(field.first_error(Some(&text("75001"))).is_none());
        // Contains a valid 5-digit run but is not one as a whole.
        assert_eq!(
            field.first_error(Some(&text("750012"))).as_deref(),
            Some("Format invalide pour Code")
        );
        assert!(field.first_error(Some(&text("x75001"))).is_some());
    }

    #[test]
    fn test_pattern_with_alternation_is_anchored_as_a_group() {
        let field = compile(
            &FieldDescriptor::new("civ", FieldKind::Text, "Civilité")
                .with_validation(rule(Some("M|Mme"), None, None)),
        )
        .unwrap();
        assert!(field.first_error(Some(&text("Mme"))).is_none());
        assert!(field.first_error(Some(&text("Mmex"))).is_some());
    }

    #[test]
    fn test_length_bounds_are_inclusive_and_count_chars() {
        let field = compile(
            &FieldDescriptor::new("prenom", FieldKind::Text, "Prénom")
                .with_validation(rule(None, Some(2), Some(4))),
        )
        .unwrap();
        assert_eq!(
            field.first_error(Some(&text("É"))).as_deref(),
            Some("Prénom doit contenir au moins 2 caractères")
        );
        assert!(field.first_error(Some(&text("Éa"))).is_none());
        assert!(field.first_error(Some(&text("Éloi"))).is_none());
        assert_eq!(
            field.first_error(Some(&text("Élodie"))).as_deref(),
            Some("Prénom ne peut pas dépasser 4 caractères")
        );
    }

    #[test]
    fn test_optional_empty_value_skips_length_and_pattern() {
        let field = compile(
            &FieldDescriptor::new("tel", FieldKind::Phone, "Téléphone")
                .with_validation(rule(Some("0[1-9][0-9]{8}"), Some(10), Some(10))),
        )
        .unwrap();
        assert!(field.failures(None).is_empty());
        assert!(field.failures(Some(&text(""))).is_empty());
    }

    #[test]
    fn test_precedence_pattern_before_min_length() {
        let field = compile(
            &FieldDescriptor::new("code", FieldKind::Text, "Code")
                .required()
                .with_validation(rule(Some("[A-Z]+"), Some(3), None)),
        )
        .unwrap();
        let failures = field.failures(Some(&text("a")));
        let names: Vec<_> = failures.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["pattern", "minLength"]);
        assert_eq!(
            field.first_error(Some(&text("a"))).as_deref(),
            Some("Format invalide pour Code")
        );
    }

    #[test]
    fn test_select_rejects_value_outside_options() {
        let field = compile(
            &FieldDescriptor::new("poste", FieldKind::SingleSelect, "Poste")
                .with_options(["Dev", "Ops"]),
        )
        .unwrap();
        assert!(field.first_error(Some(&text("Ops"))).is_none());
        assert!(field.first_error(Some(&text(""))).is_none());
        assert_eq!(
            field.first_error(Some(&text("Sales"))).as_deref(),
            Some("Valeur non autorisée pour Poste")
        );
    }

    #[test]
    fn test_compiled_schema_validates_every_field() {
        let schema = FormSchema {
            fields: vec![
                FieldDescriptor::new("full_name", FieldKind::Text, "Nom complet").required(),
                FieldDescriptor::new("rgpd_consent", FieldKind::Checkbox, "Consentement").required(),
                FieldDescriptor::new("ville", FieldKind::Text, "Ville"),
            ],
            version: "1".to_string(),
            last_updated: String::new(),
        };
        let compiled = CompiledSchema::compile(&schema).unwrap();
        let errors = compiled.validate(&FormValues::new());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["full_name"], "Nom complet est obligatoire");
        assert!(!errors.contains_key("ville"));
    }

    #[test]
    fn test_compiled_schema_rejects_invalid_schema() {
        let schema = FormSchema {
            fields: vec![FieldDescriptor::new("x", FieldKind::Text, "X")
                .with_validation(rule(Some("("), None, None))],
            version: "1".to_string(),
            last_updated: String::new(),
        };
        assert!(CompiledSchema::compile(&schema).is_err());
    }
}
