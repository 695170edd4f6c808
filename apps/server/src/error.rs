//! Error types for the filter service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Filter(#[from] tagql_filter::Error),

    #[error("the client is not authorized to access the op")]
    AccessDenied { user_id: i64, org_id: i64 },

    #[error("Invalid column name '{column}'. Please correct the column name in the 'tags' list.")]
    UnknownColumn { column: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Filter(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Error::Filter(_)
            | Error::UnknownColumn { .. }
            | Error::Database(_)
            | Error::Internal(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Filter(tagql_filter::Error::Syntax { .. }) => "syntax_error",
            Error::Filter(tagql_filter::Error::PathTooDeep { .. }) => "path_too_deep",
            Error::Filter(_) => "compile_error",
            Error::Validation(_) => "validation_error",
            Error::Unauthorized(_) => "unauthorized",
            Error::AccessDenied { .. } => "access_denied",
            Error::UnknownColumn { .. } => "unknown_column",
            Error::Database(_) | Error::Internal(_) | Error::Other(_) => "internal_error",
        }
    }

    /// Message safe to return to the caller
    fn detail(&self) -> String {
        match self {
            Error::Database(_) | Error::Internal(_) | Error::Other(_) => {
                "Internal server error".to_string()
            }
            Error::Filter(e) if !e.is_client_error() => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(kind = self.kind(), "Internal error: {}", self);
        }

        let body = Json(json!({
            "detail": self.detail(),
            "type": self.kind(),
        }));

        (status, body).into_response()
    }
}
