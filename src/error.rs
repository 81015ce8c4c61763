//! Request-level error taxonomy and its HTTP mapping.

use std::fmt::Display;

use lambda_http::{Body, Response};
use serde_json::json;
use thiserror::Error;

use crate::http::{error_response, error_response_with};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Payment not completed")]
    PaymentIncomplete { status: String },
    #[error("{context}: {message}")]
    Upstream { context: String, message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Wraps a failure from an external service, keeping its message verbatim.
    pub fn upstream(context: impl Into<String>, err: impl Display) -> Self {
        Self::Upstream {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::PaymentIncomplete { .. } => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed => 405,
            Self::Upstream { .. } => 500,
        }
    }

    pub fn into_response(self) -> Response<Body> {
        match &self {
            Self::PaymentIncomplete { status } => error_response_with(
                self.status(),
                json!({ "error": self.to_string(), "status": status }),
            ),
            _ => error_response(self.status(), &self.to_string()),
        }
    }
}

impl From<ApiError> for Response<Body> {
    fn from(err: ApiError) -> Self {
        err.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::bad_request("x").status(), 400);
        assert_eq!(ApiError::Unauthorized("x".into()).status(), 401);
        assert_eq!(ApiError::Forbidden("x".into()).status(), 403);
        assert_eq!(ApiError::not_found("x").status(), 404);
        assert_eq!(ApiError::MethodNotAllowed.status(), 405);
        assert_eq!(ApiError::upstream("Failed", "boom").status(), 500);
    }

    #[test]
    fn test_upstream_message_is_embedded() {
        let response = ApiError::upstream("Failed to fetch products", "bucket gone").into_response();
        assert_eq!(response.status(), 500);
        assert_eq!(body_json(&response)["error"], "Failed to fetch products: bucket gone");
    }

    #[test]
    fn test_payment_incomplete_carries_status() {
        let response = ApiError::PaymentIncomplete { status: "requires_payment_method".into() }.into_response();
        let body = body_json(&response);
        assert_eq!(response.status(), 400);
        assert_eq!(body["error"], "Payment not completed");
        assert_eq!(body["status"], "requires_payment_method");
    }
}
