//! HTTP error handling
//!
//! Only the `/ws` handshake can fail before the connection is upgraded;
//! everything after the upgrade reports errors in-band as signaling
//! messages. So the HTTP surface needs exactly one rejection shape.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Rejection returned by a handler before the websocket upgrade.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

/// Error response JSON structure
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_response() {
        let response = AppError::bad_request("roomId query parameter is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
