//! HTTP-facing errors and the `{code, message, data}` envelope every endpoint answers with.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::services::orders::OrderError;

/// Business code for a successful response.
pub const CODE_SUCCESS: i32 = 0;
/// Business code shared by all failures; the HTTP status carries the category.
pub const CODE_FAILURE: i32 = -1;

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct StdResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> StdResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: CODE_FAILURE,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for StdResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("user not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0} is unreachable")]
    ServiceUnreachable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Other(err) => {
                tracing::error!(error = ?err, "request failed");
                "An error occurred".to_string()
            }
            other => other.to_string(),
        };
        (status, StdResponse::<()>::failure(message)).into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::Validation(_)
            | OrderError::InvalidAmount(_)
            | OrderError::InvalidStateTransition { .. } => AppError::BadRequest(message),
            OrderError::PermissionDenied => AppError::Forbidden(message),
            OrderError::NotFound | OrderError::ProviderNotFound => AppError::NotFound(message),
            OrderError::PersistenceFailed { .. } | OrderError::Conflict(_) => {
                AppError::Other(anyhow::Error::new(err))
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
