use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::channels::ChannelError;
use crate::zapi::{CredentialsError, ZApiError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Gateway error: {0}")]
    GatewayError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::GatewayError(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (
            status,
            Json(serde_json::json!({ "success": false, "message": message })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<CredentialsError> for AppError {
    fn from(err: CredentialsError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<ZApiError> for AppError {
    fn from(err: ZApiError) -> Self {
        match err {
            ZApiError::InvalidInput(msg) => AppError::InvalidInput(msg),
            other => AppError::GatewayError(other.to_string()),
        }
    }
}

impl From<ChannelError> for AppError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::NotFound(id) => AppError::NotFound(format!("Canal não encontrado: {id}")),
            ChannelError::AlreadyExists(id) => AppError::Conflict(format!("Canal já existe: {id}")),
            ChannelError::InvalidInput(msg) => AppError::InvalidInput(msg),
            ChannelError::InvalidCredentials(e) => AppError::InvalidInput(e.to_string()),
            ChannelError::EncryptionError(e) => {
                AppError::InternalServerError(format!("Encryption error: {e}"))
            }
            ChannelError::SerializationError(e) => {
                AppError::InternalServerError(format!("Failed to process configuration: {e}"))
            }
        }
    }
}
