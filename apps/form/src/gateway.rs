//! Remote service gateway: the only place that talks HTTP to the upload
//! backend. The controller depends on the [`FormGateway`] trait so tests and
//! alternative transports can stand in for [`HttpGateway`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::attachment::SelectedAttachment;
use crate::messages;
use crate::schema::FormSchema;
use crate::settings::FormSettings;
use crate::values::FormValues;

pub const FORM_CONFIG_PATH: &str = "/api/form-config";
pub const UPLOAD_PATH: &str = "/api/upload";
pub const STATS_PATH: &str = "/api/stats";
pub const UPLOADS_PATH: &str = "/api/uploads";

/// Multipart part names expected by `POST /api/upload`.
pub const FILE_PART: &str = "cv_file";
pub const FORM_DATA_PART: &str = "form_data";

/// One server-side validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// Body of a successful `POST /api/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub success: bool,
    pub message: String,
    pub upload_id: String,
    pub cv_url: String,
    pub timestamp: String,
    pub form_fields_received: Vec<String>,
    pub file_info: FileInfo,
}

/// Body of `GET /api/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStats {
    pub total_uploads: u64,
    pub timestamp: String,
    pub storage_backend: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected {} field(s) (status {status})", .errors.len())]
    FieldErrors {
        status: u16,
        message: Option<String>,
        errors: Vec<FieldIssue>,
    },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("API error (status {status}) without detail")]
    Status { status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl GatewayError {
    /// The banner text for a failed submission: per-field issues joined into
    /// one line, else the server's message, else a generic retry prompt.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::FieldErrors { errors, .. } => {
                let joined = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {}", messages::VALIDATION_PREFIX, joined)
            }
            GatewayError::Api { message, .. } => message.clone(),
            GatewayError::Http(_)
            | GatewayError::Status { .. }
            | GatewayError::Json(_)
            | GatewayError::InvalidUrl(_) => messages::UPLOAD_FAILED.to_string(),
        }
    }

    pub fn field_issues(&self) -> &[FieldIssue] {
        match self {
            GatewayError::FieldErrors { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Detail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Detail {
    Message(String),
    Structured {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        errors: Vec<FieldIssue>,
    },
}

/// Classifies a non-2xx response body. Accepts both `{"detail": "..."}` and
/// `{"detail": {"errors": [{field, message}]}}`.
pub fn classify_error(status: u16, body: &str) -> GatewayError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: Detail::Message(message),
        }) => GatewayError::Api { status, message },
        Ok(ErrorBody {
            detail: Detail::Structured { message, errors },
        }) if !errors.is_empty() => GatewayError::FieldErrors {
            status,
            message,
            errors,
        },
        Ok(ErrorBody {
            detail:
                Detail::Structured {
                    message: Some(message),
                    ..
                },
        }) => GatewayError::Api { status, message },
        _ => GatewayError::Status { status },
    }
}

#[async_trait]
pub trait FormGateway: Send + Sync {
    async fn fetch_schema(&self) -> Result<FormSchema, GatewayError>;

    async fn submit(
        &self,
        attachment: &SelectedAttachment,
        values: &FormValues,
    ) -> Result<UploadReceipt, GatewayError>;

    async fn fetch_stats(&self) -> Result<UploadStats, GatewayError>;

    /// Detail object for one upload; its shape belongs to the backend.
    async fn fetch_upload(&self, upload_id: &str) -> Result<serde_json::Value, GatewayError>;
}

/// `reqwest`-backed gateway.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(settings: &FormSettings) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/api/uploads/<id>` with the id percent-encoded as one path segment.
    fn upload_url(&self, upload_id: &str) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.url(UPLOADS_PATH))
            .map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.clone()))?
            .push(upload_id);
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "upload API returned an error");
            return Err(classify_error(status.as_u16(), &body));
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl FormGateway for HttpGateway {
    async fn fetch_schema(&self) -> Result<FormSchema, GatewayError> {
        let schema: FormSchema = self.get_json(FORM_CONFIG_PATH).await?;
        debug!(
            version = %schema.version,
            fields = schema.fields.len(),
            "fetched form configuration"
        );
        Ok(schema)
    }

    async fn submit(
        &self,
        attachment: &SelectedAttachment,
        values: &FormValues,
    ) -> Result<UploadReceipt, GatewayError> {
        let file = Part::bytes(attachment.bytes.to_vec())
            .file_name(attachment.file_name.clone())
            .mime_str(&attachment.content_type)?;
        let form = Form::new()
            .part(FILE_PART, file)
            .text(FORM_DATA_PART, values.to_json()?);

        debug!(
            file = %attachment.file_name,
            size = attachment.size(),
            fields = values.len(),
            "submitting CV"
        );

        let response = self
            .client
            .post(self.url(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn fetch_stats(&self) -> Result<UploadStats, GatewayError> {
        self.get_json(STATS_PATH).await
    }

    async fn fetch_upload(&self, upload_id: &str) -> Result<serde_json::Value, GatewayError> {
        let response = self.client.get(self.upload_url(upload_id)?).send().await?;
        Self::read_json(response).await
    }
}
