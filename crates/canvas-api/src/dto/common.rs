//! Common DTOs used across the API

use actix_web::http::StatusCode;
use serde::Serialize;
use serde_json::json;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    /// Create a success response with data and message
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// Error body for rejected extractor input, same shape as `AppError` responses
pub fn extractor_error_body(code: &str, message: &str) -> serde_json::Value {
    json!({
        "error": code,
        "message": message,
        "status": StatusCode::BAD_REQUEST.as_u16(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response() {
        let resp = ApiResponse::success("test");
        assert_eq!(resp.data, "test");
        assert!(resp.message.is_none());

        let resp = ApiResponse::with_message("data", "success");
        assert_eq!(resp.message, Some("success".to_string()));
    }

    #[test]
    fn test_api_response_skips_empty_message() {
        let body = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert_eq!(body, json!({"data": 1}));
    }

    #[test]
    fn test_extractor_error_body() {
        let body = extractor_error_body("invalid_json", "expected value");
        assert_eq!(body["error"], "invalid_json");
        assert_eq!(body["status"], 400);
    }
}
