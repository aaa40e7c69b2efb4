use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tonic::Status;

use crate::broker::BrokerError;
use crate::repository::RepositoryError;
use crate::routing::RoutingError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        AppError::Internal(format!("failed to publish event: {err}"))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::NotFound(err.to_string())
    }
}

impl From<RoutingError> for AppError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::Timeout(after) => {
                AppError::Timeout(format!("route lookup exceeded {}ms", after.as_millis()))
            }
            other => AppError::Upstream(format!("failed to get route: {other}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => Status::not_found(msg),
            AppError::BadRequest(msg) => Status::invalid_argument(msg),
            AppError::Forbidden(msg) => Status::permission_denied(msg),
            AppError::Upstream(msg) => Status::unavailable(msg),
            AppError::Timeout(msg) => Status::deadline_exceeded(msg),
            AppError::Internal(msg) => Status::internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use tonic::Code;

    use super::AppError;
    use crate::broker::BrokerError;
    use crate::routing::RoutingError;

    #[test]
    fn routing_timeout_maps_to_gateway_timeout() {
        let err: AppError = RoutingError::Timeout(Duration::from_millis(250)).into();
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn routing_failure_maps_to_bad_gateway() {
        let err: AppError = RoutingError::NoRoute.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn publish_failure_is_internal() {
        let err: AppError = BrokerError::Closed.into();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn grpc_status_codes_follow_error_kind() {
        let cases = [
            (AppError::NotFound("x".into()), Code::NotFound),
            (AppError::BadRequest("x".into()), Code::InvalidArgument),
            (AppError::Forbidden("x".into()), Code::PermissionDenied),
            (AppError::Timeout("x".into()), Code::DeadlineExceeded),
            (AppError::Internal("x".into()), Code::Internal),
        ];
        for (err, code) in cases {
            assert_eq!(tonic::Status::from(err).code(), code);
        }
    }
}
