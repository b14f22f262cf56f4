//! # Bank Statement Uploads
//!
//! PDF only, at most [`MAX_UPLOAD_BYTES`]. Validation happens before any
//! storage call. Stored files are content-addressed: the key is the SHA-256
//! of the bytes, so re-uploading the same statement yields the same URL.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Upload size cap.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// The only accepted content type.
pub const PDF_MIME: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Errors from upload validation and storage.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("file exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },

    #[error("unsupported file type {mime}: bank statements must be PDF")]
    UnsupportedType { mime: String },

    #[error("no file was uploaded")]
    Empty,

    #[error("malformed upload: {0}")]
    Malformed(String),

    #[error("file storage failed: {0}")]
    Storage(String),
}

/// Check a declared content type and the leading bytes.
pub fn validate_pdf(content_type: Option<&str>, bytes: &[u8]) -> Result<(), UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            limit: MAX_UPLOAD_BYTES,
        });
    }
    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .unwrap_or_default();
    if declared != PDF_MIME {
        return Err(UploadError::UnsupportedType {
            mime: if declared.is_empty() {
                "unknown".to_string()
            } else {
                declared
            },
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(UploadError::UnsupportedType {
            mime: "application/pdf (content is not a PDF)".to_string(),
        });
    }
    Ok(())
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Where a stored file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub key: String,
    pub url: String,
    pub sha256: String,
}

/// Blob storage for validated uploads.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(&self, bytes: &[u8]) -> Result<StoredFile, UploadError>;
}

/// Files under a local directory, served at `{public_base_url}/uploads/{key}`.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalFileStorage {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, bytes: &[u8]) -> Result<StoredFile, UploadError> {
        let sha256 = sha256_hex(bytes);
        let key = format!("{sha256}.pdf");
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| UploadError::Storage(format!("{}: {e}", self.dir.display())))?;
        let path = self.dir.join(&key);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| UploadError::Storage(format!("{}: {e}", path.display())))?;
        tracing::debug!(key = %key, size = bytes.len(), "stored upload");
        Ok(StoredFile {
            url: format!("{}/uploads/{key}", self.public_base_url),
            key,
            sha256,
        })
    }
}
