//! Unit tests for ServerError responses

use axum::{http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;
use ratewire_runtime::{AdapterError, RuntimeError};
use ratewire_sdk::SdkError;
use ratewire_server::error::ServerError;
use serde_json::Value;

async fn body_of(err: ServerError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_error_body_shape() {
    let (status, body) = body_of(ServerError::InvalidRequest("missing facts".to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    assert_eq!(body["error"]["message"], "Invalid request: missing facts");
}

#[tokio::test]
async fn test_engine_error_codes() {
    let cases = [
        (RuntimeError::RuleSetNotFound("x".into()), StatusCode::NOT_FOUND, "RULE_SET_NOT_FOUND"),
        (RuntimeError::PipelineNotFound("x".into()), StatusCode::NOT_FOUND, "PIPELINE_NOT_FOUND"),
        (
            RuntimeError::ValidationFailed("x".into()),
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_FAILED",
        ),
        (
            RuntimeError::SystemCall(AdapterError::Cancelled),
            StatusCode::SERVICE_UNAVAILABLE,
            "CANCELLED",
        ),
    ];

    for (error, expected_status, expected_code) in cases {
        let (status, body) = body_of(SdkError::from(error).into()).await;
        assert_eq!(status, expected_status);
        assert_eq!(body["error"]["code"], expected_code);
    }
}

#[tokio::test]
async fn test_internal_error_body() {
    let (status, body) = body_of(ServerError::InternalError("disk full".to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert!(body["error"]["message"].as_str().unwrap().contains("disk full"));
}
