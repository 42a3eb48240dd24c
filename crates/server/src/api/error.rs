//! Mapping of domain errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use songsmith_core::events::EventLogError;
use songsmith_core::notify::{NotifyError, RegistryError};
use songsmith_core::order::ParseStatusError;
use songsmith_core::{OrderError, PipelineError, ProviderError};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Disallowed terms, for moderation rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<Vec<String>>,
    /// Whether retrying the same request later can succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// An error returned by a handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                terms: None,
                retryable: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn internal(message: String) -> Self {
        error!(error = %message, "Request failed with internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn with_terms(mut self, terms: Vec<String>) -> Self {
        self.body.terms = Some(terms);
        self
    }

    fn with_retryable(mut self, retryable: bool) -> Self {
        self.body.retryable = Some(retryable);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::Validation(_) => Self::bad_request(message),
            OrderError::ContentRejected(terms) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, message).with_terms(terms)
            }
            OrderError::NotFound(_) | OrderError::NotFoundOrForbidden(_) => {
                Self::new(StatusCode::NOT_FOUND, message)
            }
            OrderError::InvalidTransition { .. }
            | OrderError::AlreadyApproved(_)
            | OrderError::DuplicateLyrics(_) => Self::new(StatusCode::CONFLICT, message),
            OrderError::Database(_) => Self::internal(message),
        }
    }
}

impl From<ParseStatusError> for ApiError {
    fn from(err: ParseStatusError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let retryable = err.is_retryable();
        let message = err.to_string();
        match err {
            PipelineError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, message),
            PipelineError::Validation(_) => Self::bad_request(message),
            PipelineError::ContentRejected { terms, .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, message).with_terms(terms)
            }
            PipelineError::Provider(ProviderError::Timeout(_)) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, message).with_retryable(retryable)
            }
            PipelineError::Provider(_) | PipelineError::MalformedOutput(_) => {
                Self::new(StatusCode::BAD_GATEWAY, message).with_retryable(retryable)
            }
            PipelineError::Order(e) => Self::from(e).with_retryable(retryable),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::InvalidEndpoint(_) => Self::bad_request(message),
            RegistryError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, message),
            RegistryError::Database(_) => Self::internal(message),
        }
    }
}

impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<EventLogError> for ApiError {
    fn from(err: EventLogError) -> Self {
        Self::internal(format!("Failed to query event log: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use songsmith_core::{OrderStatus, OrderTrigger};

    #[test]
    fn test_order_error_status_codes() {
        let cases = [
            (OrderError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                OrderError::ContentRejected(vec!["x".into()]),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (OrderError::NotFoundOrForbidden("o".into()), StatusCode::NOT_FOUND),
            (OrderError::AlreadyApproved("o".into()), StatusCode::CONFLICT),
            (
                OrderError::InvalidTransition {
                    order_id: "o".into(),
                    from: OrderStatus::Draft,
                    trigger: OrderTrigger::Delivered,
                },
                StatusCode::CONFLICT,
            ),
            (OrderError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_provider_timeout_is_gateway_timeout() {
        let err = ApiError::from(PipelineError::Provider(ProviderError::Timeout(
            Duration::from_secs(30),
        )));
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.body.retryable, Some(true));

        let err = ApiError::from(PipelineError::MalformedOutput("x".into()));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_rejection_lists_terms() {
        let err = ApiError::from(PipelineError::ContentRejected {
            order_id: "o".into(),
            terms: vec!["bastard".into()],
        });
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.body.terms, Some(vec!["bastard".to_string()]));
    }
}
