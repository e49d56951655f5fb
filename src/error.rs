//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::FormRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Upstream Errors**: The hosted database/auth platform or the payment
///   processor failed or answered with an unexpected status
/// - **Authentication Errors**: Missing session, rejected credentials
/// - **Resource Errors**: Requested product or order not found
/// - **Validation Errors**: Invalid form/query data, bad webhook signature, CSRF
/// - **Internal Errors**: Template rendering and serialization failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Network or protocol failure while calling a hosted service.
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A hosted service answered with a non-success status.
    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// No valid session is attached to the request.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Authentication required")]
    Unauthenticated,

    /// Email/password (or refresh token) rejected by the auth platform.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Product does not exist or is no longer for sale.
    #[error("Product not found")]
    ProductNotFound,

    /// Order does not exist or belongs to another user.
    #[error("Order not found")]
    OrderNotFound,

    /// Request body or parameters are invalid.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Payment webhook signature is missing, malformed, stale or wrong.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Form token does not match the CSRF cookie.
    #[error("Invalid form token")]
    CsrfMismatch,
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AppError::ProductNotFound => (StatusCode::NOT_FOUND, "product_not_found"),
            AppError::OrderNotFound => (StatusCode::NOT_FOUND, "order_not_found"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::InvalidSignature => (StatusCode::BAD_REQUEST, "invalid_signature"),
            AppError::CsrfMismatch => (StatusCode::FORBIDDEN, "csrf_mismatch"),
            AppError::Http(_) | AppError::Upstream { .. } => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            AppError::Template(_) | AppError::Json(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

/// Undecodable form bodies (non-numeric quantity, malformed id) are client errors.
impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Upstream and internal failures are logged and their details hidden from the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::Http(_) | AppError::Upstream { .. } => {
                tracing::error!(error = %self, "upstream failure");
                "A dependent service is unavailable".to_string()
            }
            AppError::Template(_) | AppError::Json(_) => {
                tracing::error!(error = ?self, "internal failure");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
