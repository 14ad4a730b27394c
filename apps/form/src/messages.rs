// User-facing strings. The product ships in French only; every message the
// form can surface lives here so the wording stays consistent.

pub const CONFIG_LOAD_FAILED: &str = "Impossible de charger la configuration du formulaire";
pub const FILE_MISSING: &str = "Veuillez sélectionner un fichier CV";
pub const PDF_ONLY: &str = "Seuls les fichiers PDF sont acceptés";
pub const CONSENT_MISSING: &str = "Le consentement RGPD est obligatoire";
pub const UPLOAD_FAILED: &str = "Erreur lors de l'upload. Veuillez réessayer.";
pub const FORM_BUSY: &str = "Envoi en cours, veuillez patienter";
pub const VALIDATION_PREFIX: &str = "Erreurs de validation";
pub const STATS_LOAD_FAILED: &str = "Impossible de charger les statistiques";

pub const SELECT_PLACEHOLDER: &str = "Sélectionnez une option";
pub const REQUIRED_MARKER: &str = "*";

pub const SUCCESS_TITLE: &str = "CV reçu avec succès !";
pub const SUCCESS_TITLE_WITH_NAME: &str = "Merci {name}, votre CV a été reçu !";
pub const SUCCESS_SUBTITLE: &str = "Votre candidature est en cours d'analyse";

pub const SHOW_STATS: &str = "Voir les statistiques";
pub const HIDE_STATS: &str = "Retour au formulaire";

pub fn required(label: &str) -> String {
    format!("{label} est obligatoire")
}

pub fn invalid_format(label: &str) -> String {
    format!("Format invalide pour {label}")
}

pub fn too_short(label: &str, min: usize) -> String {
    format!("{label} doit contenir au moins {min} caractères")
}

pub fn too_long(label: &str, max: usize) -> String {
    format!("{label} ne peut pas dépasser {max} caractères")
}

pub fn not_an_option(label: &str) -> String {
    format!("Valeur non autorisée pour {label}")
}

pub fn file_too_large(max_bytes: u64) -> String {
    format!("Le fichier ne doit pas dépasser {}", megabytes(max_bytes))
}

/// Formats a byte bound as whole megabytes when exact, one decimal otherwise.
pub fn megabytes(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{:.1}MB", bytes as f64 / MIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megabytes_whole() {
        assert_eq!(megabytes(5 * 1024 * 1024), "5MB");
        assert_eq!(megabytes(10 * 1024 * 1024), "10MB");
    }

    #[test]
    fn test_megabytes_fractional() {
        assert_eq!(megabytes(1536 * 1024), "1.5MB");
    }

    #[test]
    fn test_field_messages_name_label_and_bound() {
        assert_eq!(required("Nom"), "Nom est obligatoire");
        assert_eq!(too_short("Nom", 2), "Nom doit contenir au moins 2 caractères");
        assert_eq!(too_long("Nom", 50), "Nom ne peut pas dépasser 50 caractères");
    }
}
