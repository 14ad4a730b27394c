use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Where uploaded CVs and their metadata are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    S3 {
        bucket: String,
        endpoint: String,
        access_key_id: String,
        secret_access_key: String,
    },
}

/// Application configuration loaded from environment variables.
/// Everything has a default except the S3 credentials, which are required
/// only when `STORAGE_BACKEND=s3`.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
    pub allowed_origins: Vec<String>,
    pub max_file_size: usize,
    pub allowed_file_types: Vec<String>,
    pub upload_dir: PathBuf,
    pub storage: StorageKind,
    pub extraction_timeout: Duration,
    pub min_text_length: usize,
    pub min_word_count: usize,
}

pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

pub const ALLOWED_FILE_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
    "text/plain",
];

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage = match env_or("STORAGE_BACKEND", "local").to_lowercase().as_str() {
            "local" => StorageKind::Local,
            "s3" => StorageKind::S3 {
                bucket: require_env("S3_BUCKET")?,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            },
            other => bail!("STORAGE_BACKEND must be 'local' or 's3', got '{other}'"),
        };

        Ok(Config {
            host: env_or("HOST", "127.0.0.1"),
            port: parse_env("PORT", 8000)?,
            rust_log: env_or("RUST_LOG", "info"),
            allowed_origins: env_or(
                "ALLOWED_ORIGINS",
                "http://localhost:5173,http://127.0.0.1:5173",
            )
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect(),
            max_file_size: parse_env("MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?,
            allowed_file_types: ALLOWED_FILE_TYPES.iter().map(|s| s.to_string()).collect(),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            storage,
            extraction_timeout: Duration::from_secs(parse_env("EXTRACTION_TIMEOUT", 30)?),
            min_text_length: parse_env("MIN_TEXT_LENGTH", 50)?,
            min_word_count: parse_env("MIN_WORD_COUNT", 10)?,
        })
    }

    /// Local-storage configuration rooted at `upload_dir`, used by tests.
    #[cfg(test)]
    pub fn for_tests(upload_dir: impl Into<PathBuf>) -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            allowed_origins: vec![],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_file_types: ALLOWED_FILE_TYPES.iter().map(|s| s.to_string()).collect(),
            upload_dir: upload_dir.into(),
            storage: StorageKind::Local,
            extraction_timeout: Duration::from_secs(5),
            min_text_length: 50,
            min_word_count: 10,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
