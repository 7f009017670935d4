//! API error responses.
//!
//! Every failure is a JSON body `{"success": false, "error": "..."}` with a
//! status derived from the error kind.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use kasa_core::{CoreError, ErrorKind};

use crate::app::AppError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyRegistered => StatusCode::CONFLICT,
        ErrorKind::Unsupported => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Connection
        | ErrorKind::Transport
        | ErrorKind::Protocol
        | ErrorKind::Rejected => StatusCode::BAD_GATEWAY,
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self {
            status: status_for(err.kind()),
            message: err.to_string(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Core(e) => e.into(),
            AppError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: e.to_string(),
                }
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid JSON: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        let not_found = ApiError::from(CoreError::NotFound {
            device_id: "x".into(),
        });
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let refused = ApiError::from(CoreError::Connection {
            reason: "refused".into(),
            timed_out: false,
        });
        assert_eq!(refused.into_response().status(), StatusCode::BAD_GATEWAY);

        let range = ApiError::from(CoreError::OutOfRange {
            field: "hue",
            value: 400,
            min: 0,
            max: 360,
        });
        assert_eq!(range.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
