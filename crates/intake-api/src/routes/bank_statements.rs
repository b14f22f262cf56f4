//! # Bank Statement Upload API
//!
//! `multipart/form-data` with a `file` part and an optional `applicationId`
//! part. The file is read chunk by chunk and rejected as soon as it passes
//! [`MAX_UPLOAD_BYTES`]; nothing reaches storage until size and type checks
//! pass. The route's body limit sits above the cap so oversized uploads get
//! the structured 413 rather than a bare connection error.

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use intake_core::{ApplicationId, Timestamp, UploadId};

use crate::error::AppError;
use crate::records::BankStatementRecord;
use crate::state::AppState;
use crate::uploads::{validate_pdf, UploadError, MAX_UPLOAD_BYTES, PDF_MIME};

/// Upload result.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: UploadId,
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub mime_type: String,
    /// Value to store in the form's `bankStatementUploadId` field.
    pub application_upload_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/bank-statement",
        post(upload_bank_statement).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES * 2)),
    )
}

fn multipart_error(e: MultipartError) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge {
            limit: MAX_UPLOAD_BYTES,
        }
    } else {
        UploadError::Malformed(e.body_text())
    }
}

async fn read_capped(mut field: Field<'_>) -> Result<Vec<u8>, UploadError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                limit: MAX_UPLOAD_BYTES,
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

struct UploadParts {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
    application_id: Option<ApplicationId>,
}

async fn read_parts(mut multipart: Multipart) -> Result<UploadParts, AppError> {
    let mut file = None;
    let mut application_id = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .unwrap_or("bank-statement.pdf")
                    .to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = read_capped(field).await?;
                file = Some((file_name, content_type, bytes));
            }
            Some("applicationId") => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    application_id = Some(ApplicationId::parse(&text)?);
                }
            }
            _ => {}
        }
    }
    let (file_name, content_type, bytes) = file.ok_or(UploadError::Empty)?;
    Ok(UploadParts {
        file_name,
        content_type,
        bytes,
        application_id,
    })
}

/// POST /api/bank-statement: Upload a PDF bank statement.
#[utoipa::path(
    post,
    path = "/api/bank-statement",
    request_body(content_type = "multipart/form-data", description = "`file` (PDF) and optional `applicationId`"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 413, description = "Larger than 10 MB", body = crate::error::ErrorBody),
        (status = 415, description = "Not a PDF", body = crate::error::ErrorBody),
        (status = 422, description = "No file", body = crate::error::ErrorBody),
    ),
    tag = "uploads"
)]
pub async fn upload_bank_statement(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let result = store_upload(&state, multipart).await;
    let outcome = match &result {
        Ok(_) => "accepted",
        Err(AppError::PayloadTooLarge(_)) => "too_large",
        Err(AppError::UnsupportedMediaType(_)) => "unsupported_type",
        Err(AppError::Persistence(_)) => "storage_failed",
        Err(_) => "rejected",
    };
    state.metrics.record_upload(outcome);
    result.map(|r| (StatusCode::CREATED, Json(r)))
}

async fn store_upload(state: &AppState, multipart: Multipart) -> Result<UploadResponse, AppError> {
    let parts = read_parts(multipart).await?;
    validate_pdf(parts.content_type.as_deref(), &parts.bytes)?;

    let stored = state.storage.store(&parts.bytes).await?;
    let record = BankStatementRecord {
        id: UploadId::new(),
        application_id: parts.application_id,
        file_name: parts.file_name,
        file_url: stored.url,
        file_size: parts.bytes.len() as u64,
        mime_type: PDF_MIME.to_string(),
        sha256: stored.sha256,
        uploaded_at: Timestamp::now(),
    };
    state.repository.insert_bank_statement(&record).await?;
    tracing::info!(
        upload_id = %record.id,
        size = record.file_size,
        application_id = ?record.application_id,
        "bank statement stored"
    );

    Ok(UploadResponse {
        application_upload_id: record.id.to_string(),
        id: record.id,
        file_name: record.file_name,
        file_url: record.file_url,
        file_size: record.file_size,
        mime_type: record.mime_type,
    })
}
