//! Consent discovery.
//!
//! Schemas have renamed the consent checkbox several times, so when a schema
//! does not flag its consent field explicitly the form falls back to looking
//! for any of the names that have been used for it.

use crate::schema::FormSchema;
use crate::values::FormValues;

/// Every name the consent field has been published under.
pub const KNOWN_CONSENT_FIELDS: &[&str] = &[
    "rgpd_consent",
    "consent_rgpd",
    "consentement_rgpd",
    "gdpr_consent",
    "privacy_consent",
    "consentement",
];

/// True iff one of the known consent names holds a boolean `true`.
pub fn discover_by_name(values: &FormValues) -> bool {
    KNOWN_CONSENT_FIELDS.iter().any(|name| values.is_true(name))
}

/// Consent check for a given schema. A schema that flags a consent field is
/// checked on that field only; otherwise the name list applies.
pub fn consent_given(schema: &FormSchema, values: &FormValues) -> bool {
    match schema.consent_field() {
        Some(field) => values.is_true(&field.name),
        None => discover_by_name(values),
    }
}
