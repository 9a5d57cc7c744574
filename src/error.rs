use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid request body")]
    InvalidBody(#[from] JsonRejection),

    #[error("Unauthorized")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Method Not Allowed")]
    MethodNotAllowed(String),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) | AppError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::OrmError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let data = match &self {
            AppError::BadRequest(reason)
            | AppError::Unauthorized(reason)
            | AppError::MethodNotAllowed(reason) => ErrorData {
                error: reason.clone(),
                fields: None,
            },
            AppError::InvalidBody(rejection) => ErrorData {
                error: rejection.body_text(),
                fields: None,
            },
            AppError::Validation(errors) => ErrorData {
                error: self.to_string(),
                fields: serde_json::to_value(errors).ok(),
            },
            AppError::OrmError(err) => {
                tracing::error!(error = %err, "database error");
                ErrorData {
                    error: self.to_string(),
                    fields: None,
                }
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                ErrorData {
                    error: self.to_string(),
                    fields: None,
                }
            }
            AppError::NotFound | AppError::Forbidden => ErrorData {
                error: self.to_string(),
                fields: None,
            },
        };

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(data),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
