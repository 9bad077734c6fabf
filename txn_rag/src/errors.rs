use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("no context data ingested for this user; call /ingest first")]
    NotIngested,

    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("ingest of {got} transactions exceeds the corpus ceiling of {limit}")]
    CorpusTooLarge { got: usize, limit: usize },

    #[error("upstream model call failed: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream model call exceeded its deadline")]
    UpstreamTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable identifier returned in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotIngested => "NOT_INGESTED",
            ServiceError::EmptyPrompt => "EMPTY_PROMPT",
            ServiceError::CorpusTooLarge { .. } => "CORPUS_TOO_LARGE",
            ServiceError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            ServiceError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ServiceError::Internal(_) => "INTERNAL",
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotIngested | ServiceError::EmptyPrompt => StatusCode::BAD_REQUEST,
            ServiceError::CorpusTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ServiceError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error_kind": self.kind(),
            "message": self.to_string(),
        }))
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
