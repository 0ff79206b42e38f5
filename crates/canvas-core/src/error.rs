//! Unified error handling for Canvas Billing
//!
//! This module provides a single error type that covers every failure
//! scenario in the application, with automatic HTTP response mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Message returned to callers when the simulator fails and the charge was returned.
pub const GENERATION_FAILED_MESSAGE: &str = "AI generation failed, credits have been refunded.";

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// A concurrent write invalidated the current atomic unit.
    ///
    /// Retried by the atomic unit runner; only surfaces once retries are exhausted.
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    // ==================== Business Logic Errors ====================
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Generation request not found: {0}")]
    GenerationRequestNotFound(String),

    #[error("{}", GENERATION_FAILED_MESSAGE)]
    GenerationFailed { request_id: Uuid, reason: String },

    #[error("Refund failed for generation request {request_id}; credits remain deducted: {reason}")]
    RefundFailed { request_id: Uuid, reason: String },

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required fields: {0}")]
    MissingField(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_) | AppError::MissingField(_) => StatusCode::BAD_REQUEST,

            // 402 Payment Required
            AppError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,

            // 404 Not Found
            AppError::UserNotFound(_)
            | AppError::GenerationRequestNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::WriteConflict(_) => "write_conflict",
            AppError::UserNotFound(_) => "user_not_found",
            AppError::InsufficientCredits { .. } => "insufficient_credits",
            AppError::GenerationRequestNotFound(_) => "generation_request_not_found",
            AppError::GenerationFailed { .. } => "generation_failed",
            AppError::RefundFailed { .. } => "refund_failed",
            AppError::Validation(_) => "validation_error",
            AppError::MissingField(_) => "missing_field",
            AppError::NotFound(_) => "not_found",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the atomic unit runner may retry the failed unit
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, AppError::WriteConflict(_))
    }

    /// Expected, user-facing rejections that leave no partial state behind
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::MissingField(_)
                | AppError::UserNotFound(_)
                | AppError::InsufficientCredits { .. }
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::Validation("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UserNotFound("u1".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InsufficientCredits {
                required: 4,
                available: 2
            }
            .status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            AppError::GenerationFailed {
                request_id: Uuid::nil(),
                reason: "boom".to_string()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::WriteConflict("x".to_string()).error_code(),
            "write_conflict"
        );
        assert_eq!(
            AppError::RefundFailed {
                request_id: Uuid::nil(),
                reason: "x".to_string()
            }
            .error_code(),
            "refund_failed"
        );
    }

    #[test]
    fn test_generation_failed_message_mentions_refund() {
        let err = AppError::GenerationFailed {
            request_id: Uuid::nil(),
            reason: "simulated".to_string(),
        };
        assert!(err.to_string().contains("credits have been refunded"));
    }

    #[test]
    fn test_refund_failure_is_distinct_from_generation_failure() {
        let refund = AppError::RefundFailed {
            request_id: Uuid::nil(),
            reason: "db down".to_string(),
        };
        assert_ne!(refund.error_code(), "generation_failed");
        assert!(!refund.to_string().contains("have been refunded"));
    }

    #[test]
    fn test_rejections() {
        assert!(AppError::MissingField("userId".to_string()).is_rejection());
        assert!(AppError::InsufficientCredits {
            required: 1,
            available: 0
        }
        .is_rejection());
        assert!(!AppError::Internal("x".to_string()).is_rejection());
        assert!(AppError::WriteConflict("x".to_string()).is_write_conflict());
    }
}
