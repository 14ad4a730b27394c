use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Applies to every call, the multipart upload included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_FILE_MB: u64 = 10;

#[derive(Debug, Error)]
#[error("{key} must be a positive whole number of megabytes, got '{value}'")]
pub struct SettingsError {
    pub key: &'static str,
    pub value: String,
}

/// Client-side configuration for the upload form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSettings {
    pub api_base_url: String,
    pub request_timeout: Duration,
    /// Largest CV accepted before anything is sent to the backend.
    pub max_file_bytes: u64,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            max_file_bytes: DEFAULT_MAX_FILE_MB * 1024 * 1024,
        }
    }
}

impl FormSettings {
    /// Reads `CV_API_URL` and `CV_MAX_FILE_MB`, falling back to the local
    /// backend and a 10 MB limit.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        if let Some(url) = lookup("CV_API_URL").filter(|u| !u.trim().is_empty()) {
            settings.api_base_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup("CV_MAX_FILE_MB") {
            let mb = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|mb| *mb > 0)
                .ok_or_else(|| SettingsError {
                    key: "CV_MAX_FILE_MB",
                    value: raw.clone(),
                })?;
            settings.max_file_bytes = mb * 1024 * 1024;
        }

        Ok(settings)
    }

    pub fn with_max_file_mb(mut self, mb: u64) -> Self {
        self.max_file_bytes = mb * 1024 * 1024;
        self
    }
}
