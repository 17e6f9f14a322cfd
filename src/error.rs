// Error types shared by the persistence layer and the HTTP handlers.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failure reported by a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {collection} collection: {source}")]
    Json {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Errors surfaced to API callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing required field or out-of-range value.
    #[error("{0}")]
    Validation(String),
    /// Lookup by id found nothing. Holds the entity name ("Demon", "Player").
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Request body could not be read as the expected JSON shape.
    #[error("{message}")]
    Body { status: StatusCode, message: String },
    /// Load or save failed. `context` is what the caller sees.
    #[error("{context}")]
    Persistence {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Body { status, .. } => *status,
            AppError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Wrong field types come back from axum as 422; callers get 400 like any
// other invalid body. Size and content-type rejections keep their status.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::UNPROCESSABLE_ENTITY => StatusCode::BAD_REQUEST,
            other => other,
        };
        AppError::Body {
            status,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Persistence { context, source } = &self {
            tracing::error!("{context}: {source}");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
