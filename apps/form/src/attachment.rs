use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::messages;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// The CV chosen by the user, held in memory until it is submitted.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl SelectedAttachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Size in megabytes with two decimals, as shown next to the file name.
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size() as f64 / (1024.0 * 1024.0))
    }
}

impl fmt::Debug for SelectedAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedAttachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.size())
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("file is {size} bytes, limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("media type '{0}' is not accepted")]
    NotPdf(String),

    #[error("the form is not accepting a file in its current state")]
    NotAccepting,
}

impl AttachmentError {
    pub fn user_message(&self) -> String {
        match self {
            AttachmentError::TooLarge { max, .. } => messages::file_too_large(*max),
            AttachmentError::NotPdf(_) => messages::PDF_ONLY.to_string(),
            AttachmentError::NotAccepting => messages::FORM_BUSY.to_string(),
        }
    }
}

/// Local gate applied before a file replaces the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub max_bytes: u64,
}

impl AttachmentPolicy {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn check(&self, candidate: &SelectedAttachment) -> Result<(), AttachmentError> {
        if candidate.size() > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                size: candidate.size(),
                max: self.max_bytes,
            });
        }
        if candidate.content_type != PDF_MEDIA_TYPE {
            return Err(AttachmentError::NotPdf(candidate.content_type.clone()));
        }
        Ok(())
    }
}

/// Whatever hosts the preview of a selected file (an object URL in a browser,
/// a temp file on a desktop). Every handle it creates must be revoked.
pub trait PreviewHost: Send + Sync {
    fn create(&self, attachment: &SelectedAttachment) -> String;
    fn revoke(&self, handle: &str);
}

/// Host for environments with no preview; handles are empty and free.
#[derive(Debug, Default)]
pub struct NoPreview;

impl PreviewHost for NoPreview {
    fn create(&self, _attachment: &SelectedAttachment) -> String {
        String::new()
    }

    fn revoke(&self, _handle: &str) {}
}

/// A live preview reference. Revoked when dropped, so replacing, clearing, or
/// tearing down the owner releases it.
pub struct PreviewHandle {
    handle: String,
    host: Arc<dyn PreviewHost>,
}

impl PreviewHandle {
    pub fn open(host: Arc<dyn PreviewHost>, attachment: &SelectedAttachment) -> Self {
        let handle = host.create(attachment);
        Self { handle, host }
    }

    pub fn as_str(&self) -> &str {
        &self.handle
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.host.revoke(&self.handle);
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.handle).finish()
    }
}
