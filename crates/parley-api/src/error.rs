use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Pipeline(PipelineError::InvalidTarget | PipelineError::EmptyMessage) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Pipeline(PipelineError::ReplyNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Pipeline(PipelineError::Persistence(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Pipeline(PipelineError::InvalidTarget) => "INVALID_TARGET",
            ApiError::Pipeline(PipelineError::EmptyMessage) => "EMPTY_MESSAGE",
            ApiError::Pipeline(PipelineError::ReplyNotFound(_)) => "REPLY_NOT_FOUND",
            ApiError::Pipeline(PipelineError::Persistence(_)) => "PERSISTENCE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Pipeline(PipelineError::Persistence(e)) => {
                tracing::error!("Persistence error: {:?}", e);
                "Message could not be stored".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_statuses() {
        assert_eq!(ApiError::from(PipelineError::InvalidTarget).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(PipelineError::EmptyMessage).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(PipelineError::ReplyNotFound(uuid::Uuid::nil())).status(),
            StatusCode::NOT_FOUND
        );
        let err = ApiError::from(PipelineError::Persistence(anyhow::anyhow!("disk full")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
    }

    #[test]
    fn response_carries_structured_body() {
        let resp = ApiError::Conflict("Username already taken".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
