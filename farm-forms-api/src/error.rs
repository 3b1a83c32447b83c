//! Error types for the store and the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("form not found")]
    FormNotFound,
    #[error("response not found")]
    ResponseNotFound,
    #[error("unknown user {0}")]
    UnknownUser(i64),
    #[error("invalid field type '{0}'")]
    InvalidFieldType(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::FormNotFound => ApiError::NotFound("Form not found".to_string()),
            StoreError::ResponseNotFound => ApiError::NotFound("Response not found".to_string()),
            StoreError::UnknownUser(user_id) => ApiError::BadRequest(format!("Unknown user {}", user_id)),
            other => {
                error!("Store error: {}", other);
                ApiError::Unexpected(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(error) | ApiError::NotFound(error) => ErrorResponse {
                error,
                details: None,
            },
            ApiError::Unexpected(details) => ErrorResponse {
                error: "Internal server error".to_string(),
                details: Some(details),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(ApiError::from(StoreError::FormNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(StoreError::ResponseNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(StoreError::UnknownUser(9)).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(StoreError::InvalidFieldType("Slider".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(StoreError::Database(sqlx::Error::PoolTimedOut)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unexpected_errors_carry_details() {
        let err = ApiError::from(StoreError::InvalidFieldType("Slider".to_string()));
        let ApiError::Unexpected(details) = err else {
            panic!("expected Unexpected");
        };
        assert_eq!(details, "invalid field type 'Slider'");
    }

    #[test]
    fn form_not_found_message() {
        let err = ApiError::from(StoreError::FormNotFound);
        assert_eq!(err.to_string(), "Form not found");
    }
}
