//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ratewire_sdk::{ErrorCode, SdkError};
use serde_json::json;
use thiserror::Error;

/// Server error type
#[derive(Debug, Error)]
pub enum ServerError {
    /// Rating engine error
    #[error("Engine error: {0}")]
    EngineError(#[from] SdkError),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServerError {
    /// Machine-readable code reported in the response body
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::EngineError(err) => match err.code() {
                Some(code) => code.as_str(),
                None => match err {
                    SdkError::ParseError(_) | SdkError::InvalidArtifact(_) => "INVALID_ARTIFACT",
                    SdkError::RepositoryError(_) => "REPOSITORY_ERROR",
                    _ => "ENGINE_ERROR",
                },
            },
            ServerError::InvalidRequest(_) => "INVALID_REQUEST",
            ServerError::NotFound(_) => "NOT_FOUND",
            ServerError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::EngineError(err) => match err.code() {
                Some(code) => status_for(code),
                None => match err {
                    SdkError::ParseError(_) | SdkError::InvalidArtifact(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::RuleNotFound
        | ErrorCode::RuleSetNotFound
        | ErrorCode::MappingNotFound
        | ErrorCode::PipelineNotFound => StatusCode::NOT_FOUND,
        ErrorCode::RoutingFailed
        | ErrorCode::ValidationFailed
        | ErrorCode::RequiredFieldMissing => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::SystemCallFailed => StatusCode::BAD_GATEWAY,
        ErrorCode::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::EvaluationError
        | ErrorCode::TransformationError
        | ErrorCode::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            },
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::InternalError(err.to_string())
    }
}
