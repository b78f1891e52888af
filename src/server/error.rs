use crate::orchestrator::GenerationError;
use crate::protocol::{ErrorBody, RequestRejection};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Every failure leaving the HTTP boundary: a status plus `{ "error": ... }`.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!("Bad request: {}", message);
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    /// `public` goes to the client, `detail` only to the log.
    pub fn internal(public: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        let message = public.into();
        tracing::error!("Internal error: {} ({})", message, detail);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<RequestRejection> for ApiError {
    fn from(rejection: RequestRejection) -> Self {
        match rejection {
            RequestRejection::InvalidPrompt => Self::bad_request("Invalid prompt provided"),
            RequestRejection::InvalidBody(detail) => Self::bad_request(format!("Invalid request body: {detail}")),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::InvalidPrompt => Self::bad_request(err.to_string()),
            GenerationError::Upstream(ref source) => Self::internal(err.to_string(), format!("{source:#}")),
            GenerationError::Malformed(ref malformed) => Self::internal(malformed.to_string(), format!("{malformed:?}")),
        }
    }
}

impl std::error::Error for ApiError {}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}
