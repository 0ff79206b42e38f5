//! Generation request DTOs

use canvas_core::models::{GenerationRequest, GenerationStatus, ImageModel};
use canvas_services::{GenerationInput, GenerationReceipt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Generation request body
///
/// Required fields are optional at this layer so that every missing one is
/// reported together by the lifecycle.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGenerationRequest {
    /// Requesting user
    pub user_id: Option<String>,

    /// `Model A` or `Model B`
    pub model: Option<String>,

    /// Catalog style identifier
    pub style: Option<String>,

    /// Catalog color identifier
    pub color: Option<String>,

    /// Catalog size identifier
    pub size: Option<String>,

    /// Free-form prompt
    #[validate(length(max = 2000, message = "Prompt must be at most 2000 characters"))]
    pub prompt: Option<String>,
}

impl From<CreateGenerationRequest> for GenerationInput {
    fn from(req: CreateGenerationRequest) -> Self {
        Self {
            user_id: req.user_id,
            model: req.model,
            style: req.style,
            color: req.color,
            size: req.size,
            prompt: req.prompt,
        }
    }
}

/// Response for a completed generation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationCreatedResponse {
    /// Identifier of the new request
    pub generation_request_id: Uuid,
    /// Credits charged
    pub deducted_credits: i64,
    /// Generated image
    pub image_url: String,
}

impl From<GenerationReceipt> for GenerationCreatedResponse {
    fn from(receipt: GenerationReceipt) -> Self {
        Self {
            generation_request_id: receipt.request_id,
            deducted_credits: receipt.deducted_credits,
            image_url: receipt.image_url,
        }
    }
}

/// Stored generation request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequestResponse {
    /// Request identifier
    pub id: Uuid,
    /// Requesting user
    pub user_id: String,
    /// Model used
    pub model: ImageModel,
    /// Style
    pub style: String,
    /// Color
    pub color: String,
    /// Size
    pub size: String,
    /// Prompt, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Credits charged
    pub cost: i64,
    /// Lifecycle status
    pub status: GenerationStatus,
    /// Generated image, once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Failure reason, once failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl From<GenerationRequest> for GenerationRequestResponse {
    fn from(r: GenerationRequest) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            model: r.model,
            style: r.style,
            color: r.color,
            size: r.size,
            prompt: r.prompt,
            cost: r.cost,
            status: r.status,
            image_url: r.image_url,
            error: r.error,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_camel_case() {
        let req: CreateGenerationRequest = serde_json::from_str(
            r#"{"userId":"u1","model":"Model A","style":"anime","color":"vibrant","size":"512x512"}"#,
        )
        .unwrap();

        assert_eq!(req.user_id.as_deref(), Some("u1"));
        assert!(req.prompt.is_none());
        assert!(req.validate().is_ok());

        let input = GenerationInput::from(req);
        assert_eq!(input.size.as_deref(), Some("512x512"));
    }

    #[test]
    fn test_prompt_length_validation() {
        let req = CreateGenerationRequest {
            prompt: Some("x".repeat(2001)),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = CreateGenerationRequest {
            prompt: Some("x".repeat(2000)),
            ..Default::default()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_created_response_shape() {
        let response = GenerationCreatedResponse::from(GenerationReceipt {
            request_id: Uuid::nil(),
            deducted_credits: 3,
            image_url: "https://example.com/a.png".to_string(),
        });

        let body = serde_json::to_value(response).unwrap();
        assert_eq!(body["deductedCredits"], 3);
        assert_eq!(body["imageUrl"], "https://example.com/a.png");
        assert!(body.get("generationRequestId").is_some());
    }
}
