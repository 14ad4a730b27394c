use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use cv_form::gateway::{FILE_PART, FORM_DATA_PART};
use cv_form::{FileInfo, FormSchema, UploadReceipt, UploadStats};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::intake::extract::{extract_with_timeout, text_stats, TextStats, TextThresholds};
use crate::intake::form_config::default_form_schema;
use crate::intake::models::UploadDetails;
use crate::intake::validation::{sanitize_filename, validate_cv_file};
use crate::state::AppState;

pub const UPLOAD_SAVED: &str = "CV et données sauvegardés avec succès";
pub const INVALID_FORM_JSON: &str = "Format JSON invalide pour les données du formulaire";
pub const UPLOAD_NOT_FOUND: &str = "Upload non trouvé";

struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    content: Bytes,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// GET /api/form-config
pub async fn handle_form_config() -> Json<FormSchema> {
    Json(default_form_schema())
}

/// POST /api/upload
///
/// Multipart body with a `cv_file` part and a `form_data` part holding the
/// form values as a JSON object.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadReceipt>), AppError> {
    let mut file: Option<UploadedFile> = None;
    let mut form_json: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_PART => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let content = field.bytes().await.map_err(multipart_error)?;
                file = Some(UploadedFile {
                    filename,
                    content_type,
                    content,
                });
            }
            FORM_DATA_PART => {
                form_json = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let form_json = form_json
        .ok_or_else(|| AppError::BadRequest(format!("Champ manquant: {FORM_DATA_PART}")))?;
    let file = file.ok_or_else(|| AppError::BadRequest(format!("Champ manquant: {FILE_PART}")))?;

    let form_data: Map<String, Value> = serde_json::from_str(&form_json)
        .map_err(|_| AppError::BadRequest(INVALID_FORM_JSON.to_string()))?;

    validate_cv_file(
        &file.content,
        &file.filename,
        file.content_type.as_deref(),
        &state.config,
    )?;

    let issues = state.validator.validate(&form_data);
    if !issues.is_empty() {
        info!(errors = issues.len(), "form data rejected");
        return Err(AppError::Validation(issues));
    }

    let stats = extract_stats(&state, &file).await;

    let stored = state
        .storage
        .save_cv_upload(file.content.clone(), &form_data, stats)
        .await
        .map_err(|e| AppError::Storage(format!("{e:#}")))?;
    debug!(
        cv = %stored.cv_path,
        data = %stored.data_path,
        data_url = %stored.data_url,
        "upload persisted"
    );

    let receipt = UploadReceipt {
        success: true,
        message: UPLOAD_SAVED.to_string(),
        upload_id: stored.upload_id.to_string(),
        cv_url: stored.cv_url,
        timestamp: chrono::Utc::now().to_rfc3339(),
        form_fields_received: form_data.keys().cloned().collect(),
        file_info: FileInfo {
            filename: file.filename,
            size: file.content.len() as u64,
            content_type: file.content_type.unwrap_or_default(),
        },
    };

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Text statistics for the stored metadata. Failure here never fails the upload.
async fn extract_stats(state: &AppState, file: &UploadedFile) -> Option<TextStats> {
    let thresholds = TextThresholds {
        min_text_length: state.config.min_text_length,
        min_word_count: state.config.min_word_count,
    };
    match extract_with_timeout(
        file.content.clone(),
        sanitize_filename(&file.filename),
        state.config.extraction_timeout,
    )
    .await
    {
        Ok(text) => {
            let stats = text_stats(&text, thresholds);
            if !stats.is_valid {
                warn!(
                    words = stats.word_count,
                    "extracted CV text is below the readability thresholds"
                );
            }
            Some(stats)
        }
        Err(e) => {
            warn!(error = %e, file = %file.filename, "CV text extraction failed");
            None
        }
    }
}

/// GET /api/stats
pub async fn handle_stats(State(state): State<AppState>) -> Result<Json<UploadStats>, AppError> {
    let total_uploads = state
        .storage
        .count_uploads()
        .await
        .map_err(|e| AppError::Storage(format!("{e:#}")))?;
    Ok(Json(UploadStats {
        total_uploads,
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage_backend: state.storage.backend().name().to_string(),
    }))
}

/// GET /api/uploads/:id
pub async fn handle_get_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<Json<UploadDetails>, AppError> {
    let not_found = || AppError::NotFound(UPLOAD_NOT_FOUND.to_string());
    let upload_id = Uuid::parse_str(&upload_id).map_err(|_| not_found())?;

    let metadata = state
        .storage
        .load_metadata(upload_id)
        .await
        .map_err(|e| AppError::Storage(format!("{e:#}")))?
        .ok_or_else(not_found)?;
    let cv_available = state
        .storage
        .cv_available(upload_id)
        .await
        .map_err(|e| AppError::Storage(format!("{e:#}")))?;

    Ok(Json(UploadDetails {
        upload_id,
        metadata,
        cv_available,
    }))
}
