use crate::{
    scanner::ScanError,
    server::SharedState,
    views::{self, ScannerView},
};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::path::Path;
use thiserror::Error;
use tracing::instrument;
use viume_annotator::guess_content_type;

const UPLOAD_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Please choose an image to upload.")]
    MissingFile,
    #[error("{0} is not supported. Please upload a .jpg, .jpeg or .png image.")]
    UnsupportedFileType(String),
    #[error("Could not read the upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            UploadError::MissingFile | UploadError::UnsupportedFileType(_) => {
                StatusCode::BAD_REQUEST
            }
            UploadError::Multipart(e) => e.status(),
            UploadError::Scan(e) => e.status_code(),
        }
    }

    fn user_message(&self) -> String {
        match self {
            UploadError::Scan(ScanError::InvalidImage(_)) => {
                "The uploaded file could not be read as an image.".to_string()
            }
            UploadError::Scan(_) => "Something went wrong while scanning the image.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Scan request failed: {}", self);
        } else {
            tracing::warn!("Rejected upload: {}", self);
        }

        let page = views::scanner(&ScannerView::Error(self.user_message()));
        (status, Html(page)).into_response()
    }
}

/// An accepted image upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

// Extension whitelist; the returned type is only a fallback for content
// that cannot be sniffed.
fn image_content_type(file_name: &str) -> Result<&'static str, UploadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|os_str| os_str.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        _ => Err(UploadError::UnsupportedFileType(file_name.to_string())),
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(UploadError::MissingFile);
        }
        let declared_type = image_content_type(&file_name)?;

        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(UploadError::MissingFile);
        }
        let content_type = guess_content_type(&bytes).unwrap_or(declared_type);

        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(UploadError::MissingFile)
}

#[instrument(skip(state, multipart))]
pub async fn scan_upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Html<String>, UploadError> {
    state.metrics.record_request("scanner");

    let upload = read_upload(&mut multipart).await?;
    tracing::debug!(
        "Received {} ({} bytes)",
        upload.file_name,
        upload.bytes.len()
    );

    let report = state.scan_service.scan(upload.bytes.clone()).await?;

    Ok(Html(views::scanner(&ScannerView::Report {
        upload: &upload,
        report: &report,
    })))
}
