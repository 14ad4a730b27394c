use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::intake::extract::TextStats;

/// Contents of `data/<upload_id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub upload_id: Uuid,
    pub form_data: Value,
    pub cv_filename: String,
    pub upload_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_stats: Option<TextStats>,
}

/// Response of `GET /api/uploads/:id`.
#[derive(Debug, Serialize)]
pub struct UploadDetails {
    pub upload_id: Uuid,
    pub metadata: Value,
    pub cv_available: bool,
}
