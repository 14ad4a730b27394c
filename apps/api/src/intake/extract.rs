//! Text extraction from uploaded CVs.
//!
//! Extraction only feeds the statistics stored next to an upload. It never
//! decides whether the upload is accepted: the handler logs failures and
//! carries on.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("File is empty")]
    Empty,

    #[error("Unsupported file format: {0}")]
    Unsupported(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extraction task failed: {0}")]
    Join(String),
}

/// Minimum amount of text a CV must contain to count as readable.
#[derive(Debug, Clone, Copy)]
pub struct TextThresholds {
    pub min_text_length: usize,
    pub min_word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    pub character_count: usize,
    pub word_count: usize,
    pub line_count: usize,
    pub non_empty_lines: usize,
    pub is_valid: bool,
}

/// Extracts text according to the file extension. Files without a known
/// extension are tried as PDF.
pub fn extract_text(content: &[u8], filename: &str) -> Result<String, ExtractError> {
    if content.is_empty() {
        return Err(ExtractError::Empty);
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" | "" => extract_pdf(content),
        "txt" => Ok(decode_text(content)),
        other => Err(ExtractError::Unsupported(other.to_string())),
    }
}

fn extract_pdf(content: &[u8]) -> Result<String, ExtractError> {
    let raw =
        pdf_extract::extract_text_from_mem(content).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    // pdf-extract separates pages with form feeds
    let pages: Vec<&str> = raw
        .split('\x0c')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect();
    debug!(pages = pages.len(), "extracted PDF text");
    Ok(pages.join("\n\n"))
}

/// UTF-8, falling back to Latin-1 which accepts any byte sequence.
fn decode_text(content: &[u8]) -> String {
    match std::str::from_utf8(content) {
        Ok(text) => text.trim().to_string(),
        Err(_) => content
            .iter()
            .map(|&b| b as char)
            .collect::<String>()
            .trim()
            .to_string(),
    }
}

/// Runs [`extract_text`] on the blocking pool, bounded by `timeout`.
pub async fn extract_with_timeout(
    content: Bytes,
    filename: String,
    timeout: Duration,
) -> Result<String, ExtractError> {
    let task = tokio::task::spawn_blocking(move || extract_text(&content, &filename));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(ExtractError::Join(join.to_string())),
        Err(_) => Err(ExtractError::Timeout(timeout)),
    }
}

pub fn validate_extracted_text(text: &str, thresholds: TextThresholds) -> bool {
    let text = text.trim();
    text.chars().count() >= thresholds.min_text_length
        && text.split_whitespace().count() >= thresholds.min_word_count
}

pub fn text_stats(text: &str, thresholds: TextThresholds) -> TextStats {
    TextStats {
        character_count: text.chars().count(),
        word_count: text.split_whitespace().count(),
        line_count: text.lines().count(),
        non_empty_lines: text.lines().filter(|l| !l.trim().is_empty()).count(),
        is_valid: validate_extracted_text(text, thresholds),
    }
}
