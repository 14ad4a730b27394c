use cv_form::{FieldDescriptor, FieldKind, FormSchema, ValidationRule};

pub const FORM_VERSION: &str = "1.0";

const EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";
const PHONE_PATTERN: &str = r"(?:\+33|0)[1-9](?:[ .-]?[0-9]{2}){4}";

fn name_rule() -> ValidationRule {
    ValidationRule {
        pattern: None,
        min_length: Some(2),
        max_length: Some(50),
    }
}

fn pattern_rule(pattern: &str) -> ValidationRule {
    ValidationRule {
        pattern: Some(pattern.to_string()),
        ..ValidationRule::default()
    }
}

/// The form published at `GET /api/form-config`. Its client-side rules mirror
/// the server's name rules so most mistakes are caught before upload.
pub fn default_form_schema() -> FormSchema {
    FormSchema {
        fields: vec![
            FieldDescriptor::new("prenom", FieldKind::Text, "Prénom")
                .required()
                .with_placeholder("Votre prénom")
                .with_validation(name_rule()),
            FieldDescriptor::new("nom", FieldKind::Text, "Nom")
                .required()
                .with_placeholder("Votre nom")
                .with_validation(name_rule()),
            FieldDescriptor::new("email", FieldKind::Email, "Email")
                .required()
                .with_placeholder("votre.email@exemple.com")
                .with_validation(pattern_rule(EMAIL_PATTERN)),
            FieldDescriptor::new("telephone", FieldKind::Phone, "Téléphone")
                .with_placeholder("01 23 45 67 89")
                .with_validation(pattern_rule(PHONE_PATTERN)),
            FieldDescriptor::new("localisation", FieldKind::Text, "Localisation")
                .with_placeholder("Ville, Région"),
            FieldDescriptor::new("date_disponibilite", FieldKind::Date, "Date de disponibilité"),
            FieldDescriptor::new(
                "rgpd_consent",
                FieldKind::Checkbox,
                "J'accepte le traitement de mes données personnelles conformément au RGPD",
            )
            .required()
            .consent(),
        ],
        version: FORM_VERSION.to_string(),
        last_updated: chrono::Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_form::{CompiledSchema, FieldValue, FormValues};

    #[test]
    fn test_default_schema_is_valid_and_ordered() {
        let schema = default_form_schema();
        schema.validate().unwrap();
        let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "prenom",
                "nom",
                "email",
                "telephone",
                "localisation",
                "date_disponibilite",
                "rgpd_consent"
            ]
        );
        assert_eq!(schema.consent_field().unwrap().name, "rgpd_consent");
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(default_form_schema()).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["fields"][3]["type"], "tel");
        assert_eq!(json["fields"][5]["type"], "date");
        assert_eq!(json["fields"][6]["required"], true);
    }

    #[test]
    fn test_client_rules_accept_a_typical_submission() {
        let compiled = CompiledSchema::compile(&default_form_schema()).unwrap();
        let values: FormValues = [
            ("prenom", FieldValue::text("Jean")),
            ("nom", FieldValue::text("Dupont")),
            ("email", FieldValue::text("jean@exemple.fr")),
            ("telephone", FieldValue::text("01 23 45 67 89")),
            ("rgpd_consent", FieldValue::Bool(true)),
        ]
        .into_iter()
        .collect();
        let errors = compiled.validate(&values);
        assert!(errors.is_empty(), "{errors:?}");
    }
}
