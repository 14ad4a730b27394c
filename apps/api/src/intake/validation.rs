//! Server-side checks on an upload: the file itself, then the submitted form
//! data. Form checks are keyed on field names rather than on the published
//! schema, so they keep working when the form configuration changes.

use anyhow::{Context, Result};
use cv_form::consent::KNOWN_CONSENT_FIELDS;
use cv_form::FieldIssue;
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::errors::AppError;

const PDF_MAGIC: &[u8] = b"%PDF-";

pub const FILE_TOO_LARGE_PREFIX: &str = "Fichier trop volumineux";
pub const NOT_A_PDF: &str = "Le fichier ne semble pas être un PDF valide";
pub const PDF_ONLY: &str = "Seuls les fichiers PDF sont acceptés";
pub const CONSENT_REQUIRED: &str =
    "Le consentement RGPD est obligatoire et doit être explicitement accepté";

/// Rejects the file with 413 or 415 before anything is stored.
///
/// A declared content type outside the allow-list is tolerated when the bytes
/// start with the PDF magic number, since browsers often send
/// `application/octet-stream`.
pub fn validate_cv_file(
    content: &[u8],
    filename: &str,
    content_type: Option<&str>,
    config: &Config,
) -> Result<(), AppError> {
    if content.len() > config.max_file_size {
        return Err(AppError::PayloadTooLarge(format!(
            "{FILE_TOO_LARGE_PREFIX}. Taille maximale: {:.1}MB",
            config.max_file_size as f64 / (1024.0 * 1024.0)
        )));
    }

    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase())
        .unwrap_or_default();
    let allowed = config.allowed_file_types.iter().any(|t| *t == declared);
    if !allowed && !content.starts_with(PDF_MAGIC) {
        return Err(AppError::UnsupportedMediaType(NOT_A_PDF.to_string()));
    }

    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::UnsupportedMediaType(PDF_ONLY.to_string()));
    }

    Ok(())
}

const MAX_FILENAME_LEN: usize = 255;

/// Strips directory components and anything outside `[A-Za-z0-9._-]`, and caps
/// the length while keeping the extension.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return "upload".to_string();
    }
    if cleaned.len() <= MAX_FILENAME_LEN {
        return cleaned.to_string();
    }

    // ASCII only at this point, so byte slicing is safe
    match cleaned.rfind('.') {
        Some(dot) if cleaned.len() - dot < MAX_FILENAME_LEN => {
            let extension = &cleaned[dot..];
            format!("{}{extension}", &cleaned[..MAX_FILENAME_LEN - extension.len()])
        }
        _ => cleaned[..MAX_FILENAME_LEN].to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Form data
// ────────────────────────────────────────────────────────────────────────────

struct NameRule {
    key: &'static str,
    required: bool,
    pattern: Option<&'static str>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    must_be_true: bool,
    message: &'static str,
}

static NAME_RULES: &[NameRule] = &[
    NameRule {
        key: "email",
        required: false,
        pattern: Some(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"),
        min_length: None,
        max_length: None,
        must_be_true: false,
        message: "Format email invalide",
    },
    NameRule {
        key: "phone",
        required: false,
        pattern: Some(r"(?:\+33|0)[1-9](?:[ .-]?[0-9]{2}){4}"),
        min_length: None,
        max_length: None,
        must_be_true: false,
        message: "Format téléphone invalide (format français attendu)",
    },
    NameRule {
        key: "prenom",
        required: true,
        pattern: None,
        min_length: Some(2),
        max_length: Some(50),
        must_be_true: false,
        message: "",
    },
    NameRule {
        key: "nom",
        required: true,
        pattern: None,
        min_length: Some(2),
        max_length: Some(50),
        must_be_true: false,
        message: "",
    },
    NameRule {
        key: "rgpd_consent",
        required: true,
        pattern: None,
        min_length: None,
        max_length: None,
        must_be_true: true,
        message: CONSENT_REQUIRED,
    },
];

struct CompiledRule {
    rule: &'static NameRule,
    pattern: Option<Regex>,
}

/// Validates submitted form data against the name rule table.
pub struct FormDataValidator {
    rules: Vec<CompiledRule>,
}

impl FormDataValidator {
    pub fn new() -> Result<Self> {
        let rules = NAME_RULES
            .iter()
            .map(|rule| {
                let pattern = rule
                    .pattern
                    .map(|p| Regex::new(&format!("^(?:{p})$")))
                    .transpose()
                    .with_context(|| format!("Invalid pattern for rule '{}'", rule.key))?;
                Ok(CompiledRule { rule, pattern })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Every failure, at most one per field plus the consent check.
    pub fn validate(&self, form_data: &Map<String, Value>) -> Vec<FieldIssue> {
        let mut issues = Vec::new();

        if !has_consent(form_data) {
            issues.push(FieldIssue {
                field: "rgpd_consent".to_string(),
                message: CONSENT_REQUIRED.to_string(),
            });
        }

        for (name, value) in form_data {
            let lowered = name.to_lowercase();
            if lowered.is_empty() {
                continue;
            }
            let failure = self
                .rules
                .iter()
                .filter(|c| lowered.contains(c.rule.key) || c.rule.key.contains(lowered.as_str()))
                .find_map(|c| c.check(name, value));
            if let Some(message) = failure {
                if !issues.iter().any(|i| i.field == *name && i.message == message) {
                    issues.push(FieldIssue {
                        field: name.clone(),
                        message,
                    });
                }
            }
        }

        issues
    }
}

impl CompiledRule {
    fn check(&self, name: &str, value: &Value) -> Option<String> {
        let rule = self.rule;
        let text = value_text(value);

        if text.trim().is_empty() {
            return rule
                .required
                .then(|| format!("Le champ {name} est obligatoire"));
        }

        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&text) {
                return Some(rule.message.to_string());
            }
        }

        let length = text.chars().count();
        if let Some(min) = rule.min_length {
            if length < min {
                return Some(format!("Minimum {min} caractères requis"));
            }
        }
        if let Some(max) = rule.max_length {
            if length > max {
                return Some(format!("Maximum {max} caractères autorisés"));
            }
        }

        if rule.must_be_true && *value != Value::Bool(true) {
            return Some(rule.message.to_string());
        }

        None
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lenient consent check: any known consent name holding a truthy value.
pub fn has_consent(form_data: &Map<String, Value>) -> bool {
    KNOWN_CONSENT_FIELDS
        .iter()
        .filter_map(|name| form_data.get(*name))
        .any(is_truthy)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "oui"
        ),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}
