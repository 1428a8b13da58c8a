use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    #[serde(rename = "AUTH_1001")]
    InvalidCredentials,
    #[serde(rename = "AUTH_1002")]
    TokenExpired,
    #[serde(rename = "AUTH_1003")]
    TokenInvalid,
    #[serde(rename = "AUTH_1004")]
    TokenMissing,
    #[serde(rename = "AUTH_1005")]
    AccountInactive,

    // Authorization errors (2xxx)
    #[serde(rename = "AUTHZ_2001")]
    InsufficientPermissions,
    #[serde(rename = "AUTHZ_2002")]
    ResourceAccessDenied,

    // Validation errors (3xxx)
    #[serde(rename = "VAL_3001")]
    InvalidInput,
    #[serde(rename = "VAL_3002")]
    MissingRequiredField,
    #[serde(rename = "VAL_3003")]
    InvalidFormat,
    #[serde(rename = "VAL_3004")]
    InvalidEmail,
    #[serde(rename = "VAL_3005")]
    InvalidMobileNumber,
    #[serde(rename = "VAL_3006")]
    InvalidOtp,

    // Resource errors (4xxx)
    #[serde(rename = "RES_4001")]
    NotFound,
    #[serde(rename = "RES_4002")]
    AlreadyExists,
    #[serde(rename = "RES_4003")]
    Conflict,

    // Business logic errors (5xxx)
    #[serde(rename = "BIZ_5001")]
    InsufficientStock,
    #[serde(rename = "BIZ_5002")]
    OrderAlreadyDelivered,
    #[serde(rename = "BIZ_5003")]
    OrderAlreadyCancelled,
    #[serde(rename = "BIZ_5004")]
    PaymentAlreadyConfirmed,
    #[serde(rename = "BIZ_5005")]
    AmountMismatch,

    // Database errors (7xxx)
    #[serde(rename = "DB_7001")]
    QueryFailed,

    // External service errors (8xxx)
    #[serde(rename = "EXT_8001")]
    ExternalServiceUnavailable,
    #[serde(rename = "EXT_8002")]
    EmailServiceFailed,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9999")]
    InternalServerError,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::InvalidCredentials => 1001,
            ErrorCode::TokenExpired => 1002,
            ErrorCode::TokenInvalid => 1003,
            ErrorCode::TokenMissing => 1004,
            ErrorCode::AccountInactive => 1005,

            ErrorCode::InsufficientPermissions => 2001,
            ErrorCode::ResourceAccessDenied => 2002,

            ErrorCode::InvalidInput => 3001,
            ErrorCode::MissingRequiredField => 3002,
            ErrorCode::InvalidFormat => 3003,
            ErrorCode::InvalidEmail => 3004,
            ErrorCode::InvalidMobileNumber => 3005,
            ErrorCode::InvalidOtp => 3006,

            ErrorCode::NotFound => 4001,
            ErrorCode::AlreadyExists => 4002,
            ErrorCode::Conflict => 4003,

            ErrorCode::InsufficientStock => 5001,
            ErrorCode::OrderAlreadyDelivered => 5002,
            ErrorCode::OrderAlreadyCancelled => 5003,
            ErrorCode::PaymentAlreadyConfirmed => 5004,
            ErrorCode::AmountMismatch => 5005,

            ErrorCode::QueryFailed => 7001,

            ErrorCode::ExternalServiceUnavailable => 8001,
            ErrorCode::EmailServiceFailed => 8002,

            ErrorCode::InternalServerError => 9999,
        }
    }

    /// Get user-friendly message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidCredentials => "Invalid email or password",
            ErrorCode::TokenExpired => "Your session has expired. Please log in again",
            ErrorCode::TokenInvalid => "Invalid authentication token",
            ErrorCode::TokenMissing => "Authentication required. Please log in",
            ErrorCode::AccountInactive => "Account is blocked",

            ErrorCode::InsufficientPermissions => {
                "You don't have permission to perform this action"
            }
            ErrorCode::ResourceAccessDenied => "Access to this resource is denied",

            ErrorCode::InvalidInput => "Invalid input provided",
            ErrorCode::MissingRequiredField => "Required field is missing",
            ErrorCode::InvalidFormat => "Invalid format provided",
            ErrorCode::InvalidEmail => "Invalid email address format",
            ErrorCode::InvalidMobileNumber => "Invalid mobile number format",
            ErrorCode::InvalidOtp => "Invalid OTP",

            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::AlreadyExists => "This resource already exists",
            ErrorCode::Conflict => "A conflict occurred with an existing resource",

            ErrorCode::InsufficientStock => "Not enough stock to fulfil the order",
            ErrorCode::OrderAlreadyDelivered => "Delivered orders cannot be modified",
            ErrorCode::OrderAlreadyCancelled => "Order already cancelled",
            ErrorCode::PaymentAlreadyConfirmed => "Payment already confirmed",
            ErrorCode::AmountMismatch => "Amount mismatch with order total",

            ErrorCode::QueryFailed => "Database query failed",

            ErrorCode::ExternalServiceUnavailable => "External service is currently unavailable",
            ErrorCode::EmailServiceFailed => "Failed to send email",

            ErrorCode::InternalServerError => "An internal server error occurred",
        }
    }
}

/// Structured error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub code_number: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("{1}")]
    WithCode(ErrorCode, String),
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Internal(format!("Serialization error: {}", e))
    }
}

impl ApiError {
    /// Create error with specific error code
    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError::WithCode(code, message.into())
    }

    /// Helper: invalid credentials
    pub fn invalid_credentials() -> Self {
        ApiError::with_code(ErrorCode::InvalidCredentials, "Invalid credentials")
    }

    /// Helper: resource not found
    pub fn not_found(resource: &str) -> Self {
        ApiError::with_code(ErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Helper: resource already exists
    pub fn already_exists(resource: &str) -> Self {
        ApiError::with_code(
            ErrorCode::AlreadyExists,
            format!("{} already exists", resource),
        )
    }

    /// Get error code
    fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::Authentication(_) => ErrorCode::InvalidCredentials,
            ApiError::BadRequest(_) => ErrorCode::InvalidInput,
            ApiError::Unauthorized(_) => ErrorCode::TokenMissing,
            ApiError::Forbidden(_) => ErrorCode::ResourceAccessDenied,
            ApiError::Validation(_) => ErrorCode::InvalidInput,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Conflict(_) => ErrorCode::Conflict,
            ApiError::Database(_) => ErrorCode::QueryFailed,
            ApiError::ExternalService(_) => ErrorCode::ExternalServiceUnavailable,
            ApiError::Internal(_) => ErrorCode::InternalServerError,
            ApiError::WithCode(code, _) => *code,
        }
    }

    /// Get status code
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Authentication(_)
            | ApiError::Unauthorized(_)
            | ApiError::WithCode(ErrorCode::InvalidCredentials, _)
            | ApiError::WithCode(ErrorCode::TokenExpired, _)
            | ApiError::WithCode(ErrorCode::TokenInvalid, _)
            | ApiError::WithCode(ErrorCode::TokenMissing, _) => StatusCode::UNAUTHORIZED,

            ApiError::Forbidden(_)
            | ApiError::WithCode(ErrorCode::AccountInactive, _)
            | ApiError::WithCode(ErrorCode::InsufficientPermissions, _)
            | ApiError::WithCode(ErrorCode::ResourceAccessDenied, _) => StatusCode::FORBIDDEN,

            // Conflicting-state business errors surface as 400s, matching the
            // storefront's client contract (already delivered / cancelled / paid).
            ApiError::BadRequest(_)
            | ApiError::Validation(_)
            | ApiError::WithCode(ErrorCode::InvalidInput, _)
            | ApiError::WithCode(ErrorCode::MissingRequiredField, _)
            | ApiError::WithCode(ErrorCode::InvalidFormat, _)
            | ApiError::WithCode(ErrorCode::InvalidEmail, _)
            | ApiError::WithCode(ErrorCode::InvalidMobileNumber, _)
            | ApiError::WithCode(ErrorCode::InvalidOtp, _)
            | ApiError::WithCode(ErrorCode::InsufficientStock, _)
            | ApiError::WithCode(ErrorCode::OrderAlreadyDelivered, _)
            | ApiError::WithCode(ErrorCode::OrderAlreadyCancelled, _)
            | ApiError::WithCode(ErrorCode::PaymentAlreadyConfirmed, _)
            | ApiError::WithCode(ErrorCode::AmountMismatch, _)
            | ApiError::WithCode(ErrorCode::AlreadyExists, _) => StatusCode::BAD_REQUEST,

            ApiError::NotFound(_) | ApiError::WithCode(ErrorCode::NotFound, _) => {
                StatusCode::NOT_FOUND
            }

            ApiError::Conflict(_) | ApiError::WithCode(ErrorCode::Conflict, _) => {
                StatusCode::CONFLICT
            }

            ApiError::ExternalService(_)
            | ApiError::WithCode(ErrorCode::ExternalServiceUnavailable, _) => {
                StatusCode::BAD_GATEWAY
            }

            ApiError::Database(_)
            | ApiError::Internal(_)
            | ApiError::WithCode(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log error with appropriate level
    fn log_error(&self, request_id: &str) {
        match self.status_code() {
            status if status.is_server_error() => {
                error!(
                    request_id = %request_id,
                    error = %self,
                    "Server error occurred"
                );
            }
            status if status.is_client_error() => {
                warn!(
                    request_id = %request_id,
                    error = %self,
                    "Client error occurred"
                );
            }
            _ => {}
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status = self.status_code();
        let code = self.error_code();

        self.log_error(&request_id);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code,
                code_number: code.code(),
                message: match &self {
                    ApiError::WithCode(_, msg) => msg.clone(),
                    // Internal details stay server-side; the client gets the
                    // generic message for the category.
                    ApiError::Database(_) | ApiError::Internal(_) => code.message().to_string(),
                    other => other.to_string(),
                },
                details: None,
            },
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicting_state_errors_are_client_errors() {
        let err = ApiError::with_code(ErrorCode::OrderAlreadyDelivered, "Delivered");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = ApiError::with_code(ErrorCode::OrderAlreadyCancelled, "Cancelled");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn database_errors_hide_details() {
        let err = ApiError::Database(sqlx::Error::PoolClosed);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code().code(), 7001);
    }

    #[test]
    fn ownership_failures_are_forbidden() {
        let err = ApiError::Forbidden("Not authorized".to_string());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
