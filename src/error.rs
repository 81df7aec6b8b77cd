use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::path::PathBuf;

/// Request-level failures, each surfaced to the client as a short plain-text body
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Request is malformed")]
    MalformedRequest,
    #[error("Error parsing multipart form")]
    Multipart(#[source] MultipartError),
    #[error("Failed to get absolute path")]
    ResolveDir {
        dir: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to create upload directory")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No files uploaded")]
    NoFiles,
    /// Per-file causes live in the `UploadReport`; only the counts travel here.
    #[error("Failed to upload some files")]
    PartialFailure { failed: usize, total: usize },
}

impl ResponseError for UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            UploadError::MalformedRequest | UploadError::NoFiles => StatusCode::BAD_REQUEST,
            UploadError::Multipart(_)
            | UploadError::ResolveDir { .. }
            | UploadError::CreateDir { .. }
            | UploadError::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type(mime::TEXT_PLAIN_UTF_8)
            .body(format!("{}\n", self))
    }
}

/// Failures while reading the multipart body
#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error(transparent)]
    Stream(#[from] actix_multipart::MultipartError),
    #[error("form exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("failed to spool file part")]
    Spool(#[source] std::io::Error),
    #[error("blocking spool task did not complete")]
    Cancelled,
}

/// Why a single file could not be stored
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("`{file_name}` has no usable base name")]
    InvalidFileName { file_name: String },
    #[error("failed to open uploaded part `{file_name}`")]
    Open {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create `{}`", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to copy into `{}`", .path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store task for `{file_name}` did not complete")]
    Cancelled { file_name: String },
}
