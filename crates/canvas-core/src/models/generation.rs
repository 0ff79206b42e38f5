//! Generation request model
//!
//! One user-initiated attempt to produce an image, tracked through
//! `Pending -> {Completed, Failed}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Placeholder image served by the simulated Model A
pub const MODEL_A_PLACEHOLDER_URL: &str =
    "https://storage.googleapis.com/proudcity/mebanenc/uploads/2018/02/placeholder-image.png";

/// Placeholder image served by the simulated Model B
pub const MODEL_B_PLACEHOLDER_URL: &str =
    "https://www.russorizio.com/wp-content/uploads/2016/07/ef3-placeholder-image.jpg";

/// Image generation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageModel {
    #[serde(rename = "Model A", alias = "model-a")]
    ModelA,
    #[serde(rename = "Model B", alias = "model-b")]
    ModelB,
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ImageModel {
    /// Every known model
    pub const ALL: [ImageModel; 2] = [ImageModel::ModelA, ImageModel::ModelB];

    /// Canonical identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageModel::ModelA => "Model A",
            ImageModel::ModelB => "Model B",
        }
    }

    /// Parse a model identifier, accepting the canonical and kebab-case spellings
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "Model A" | "model-a" => Some(ImageModel::ModelA),
            "Model B" | "model-b" => Some(ImageModel::ModelB),
            _ => None,
        }
    }

    /// Placeholder image the simulator returns for this model
    pub fn placeholder_url(&self) -> &'static str {
        match self {
            ImageModel::ModelA => MODEL_A_PLACEHOLDER_URL,
            ImageModel::ModelB => MODEL_B_PLACEHOLDER_URL,
        }
    }
}

/// Generation request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Credits charged, simulator not yet answered
    #[default]
    Pending,
    /// Image produced
    Completed,
    /// Simulator failed, credits refunded
    Failed,
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStatus::Pending => write!(f, "pending"),
            GenerationStatus::Completed => write!(f, "completed"),
            GenerationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl GenerationStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(GenerationStatus::Pending),
            "completed" => Some(GenerationStatus::Completed),
            "failed" => Some(GenerationStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationStatus::Pending)
    }

    /// Check whether `next` is a legal transition from this state
    pub fn can_transition_to(&self, next: GenerationStatus) -> bool {
        matches!(
            (self, next),
            (GenerationStatus::Pending, GenerationStatus::Completed)
                | (GenerationStatus::Pending, GenerationStatus::Failed)
        )
    }
}

/// Generation request entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Unique identifier
    pub id: Uuid,

    /// Requesting user
    pub user_id: String,

    /// Model used
    pub model: ImageModel,

    /// Catalog style identifier
    pub style: String,

    /// Catalog color identifier
    pub color: String,

    /// Catalog size identifier
    pub size: String,

    /// Free-form prompt
    pub prompt: Option<String>,

    /// Credits charged (cost of `size`)
    pub cost: i64,

    /// Lifecycle status
    pub status: GenerationStatus,

    /// Generated image, set on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Simulator failure reason, set on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl GenerationRequest {
    /// Create a pending request, ready to be written alongside its deduction
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        user_id: impl Into<String>,
        model: ImageModel,
        style: impl Into<String>,
        color: impl Into<String>,
        size: impl Into<String>,
        prompt: Option<String>,
        cost: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            model,
            style: style.into(),
            color: color.into(),
            size: size.into(),
            prompt,
            cost,
            status: GenerationStatus::Pending,
            image_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Simulator answer for one generation attempt
///
/// Serializes as `{"success": true, "imageUrl": ...}` or
/// `{"success": false, "error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success { image_url: String },
    Failure { error: String },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Serialize for GenerationOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            GenerationOutcome::Success { image_url } => OutcomeWire {
                success: true,
                image_url: Some(image_url.clone()),
                error: None,
            },
            GenerationOutcome::Failure { error } => OutcomeWire {
                success: false,
                image_url: None,
                error: Some(error.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GenerationOutcome {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = OutcomeWire::deserialize(deserializer)?;
        match (wire.success, wire.image_url) {
            (true, Some(image_url)) => Ok(GenerationOutcome::Success { image_url }),
            (true, None) => Err(serde::de::Error::missing_field("imageUrl")),
            (false, _) => Ok(GenerationOutcome::Failure {
                error: wire.error.unwrap_or_default(),
            }),
        }
    }
}

impl GenerationOutcome {
    /// Successful generation
    pub fn success(image_url: impl Into<String>) -> Self {
        GenerationOutcome::Success {
            image_url: image_url.into(),
        }
    }

    /// Failed generation
    pub fn failure(error: impl Into<String>) -> Self {
        GenerationOutcome::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_parsing() {
        assert_eq!(ImageModel::from_str("Model A"), Some(ImageModel::ModelA));
        assert_eq!(ImageModel::from_str("model-b"), Some(ImageModel::ModelB));
        assert_eq!(ImageModel::from_str("Invalid Model"), None);
        assert_eq!(ImageModel::from_str("model a"), None);
    }

    #[test]
    fn test_placeholder_mapping() {
        assert_eq!(ImageModel::ModelA.placeholder_url(), MODEL_A_PLACEHOLDER_URL);
        assert_eq!(ImageModel::ModelB.placeholder_url(), MODEL_B_PLACEHOLDER_URL);
    }

    #[test]
    fn test_model_serde_uses_canonical_name() {
        let json = serde_json::to_string(&ImageModel::ModelA).unwrap();
        assert_eq!(json, "\"Model A\"");
        let parsed: ImageModel = serde_json::from_str("\"model-b\"").unwrap();
        assert_eq!(parsed, ImageModel::ModelB);
    }

    #[test]
    fn test_status_transitions() {
        use GenerationStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(Completed.is_terminal());
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn test_outcome_wire_format() {
        let ok = serde_json::to_value(GenerationOutcome::success("http://img")).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["imageUrl"], "http://img");

        let failed: GenerationOutcome =
            serde_json::from_str(r#"{"success": false, "error": "boom"}"#).unwrap();
        assert_eq!(failed, GenerationOutcome::failure("boom"));
        assert!(!failed.is_success());
    }
}
