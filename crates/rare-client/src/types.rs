//! Request and response types for the rare event detection API

use serde::{Deserialize, Serialize};

/// Similarity above which the backend labels an image a rare event.
///
/// The real threshold lives server-side; this mirrors the deployed value and
/// is only used by the mock backend.
pub const RARE_EVENT_THRESHOLD: f64 = 0.7;

/// Label string for rare events
pub const LABEL_RARE_EVENT: &str = "Rare Event";
/// Label string for normal images
pub const LABEL_NORMAL: &str = "Normal";

// =============================================================================
// Health / Info Types
// =============================================================================

/// Response from `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    /// Compute device the models run on (e.g. "cuda", "cpu")
    pub device: String,
    #[serde(default)]
    pub models_loaded: Option<ModelsLoaded>,
    #[serde(default)]
    pub reference_count: Option<usize>,
}

/// Which backend models are loaded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsLoaded {
    #[serde(default)]
    pub clip: bool,
    #[serde(default)]
    pub blip: bool,
    #[serde(default)]
    pub stable_diffusion: bool,
}

impl ModelsLoaded {
    /// True when every model reports loaded
    pub fn all(&self) -> bool {
        self.clip && self.blip && self.stable_diffusion
    }
}

/// Response from `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiInfo {
    pub message: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

// =============================================================================
// Operation Responses
// =============================================================================

/// Response from `POST /upload_references`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
}

/// Response from `POST /classify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub label: String,
    /// Highest similarity against the reference set, 0..=1
    pub similarity: f64,
    /// Similarity against each reference, in upload order
    #[serde(default)]
    pub all_similarities: Vec<f64>,
}

impl ClassifyResponse {
    /// Interpret the label string
    pub fn event_label(&self) -> EventLabel {
        EventLabel::from(self.label.as_str())
    }

    /// Whether the backend flagged this image as a rare event
    pub fn is_rare_event(&self) -> bool {
        self.event_label() == EventLabel::RareEvent
    }

    /// Similarity rendered as a percentage with one decimal, e.g. `83.4%`
    pub fn confidence(&self) -> String {
        format!("{:.1}%", self.similarity * 100.0)
    }
}

/// Known classification labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventLabel {
    RareEvent,
    Normal,
    Other(String),
}

impl From<&str> for EventLabel {
    fn from(label: &str) -> Self {
        match label {
            LABEL_RARE_EVENT => Self::RareEvent,
            LABEL_NORMAL => Self::Normal,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RareEvent => f.write_str(LABEL_RARE_EVENT),
            Self::Normal => f.write_str(LABEL_NORMAL),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Response from `POST /describe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub description: String,
}

/// Response from `POST /generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated image as a `data:` URI
    pub image: String,
    /// Caption the image was generated from
    pub caption: String,
}

// =============================================================================
// Error Types
// =============================================================================

/// Error body returned by the backend on failure
///
/// `detail` is usually a string, but request validation failures carry a
/// structured list instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Render `detail` for display
    pub fn detail_message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_label_parsing() {
        assert_eq!(EventLabel::from("Rare Event"), EventLabel::RareEvent);
        assert_eq!(EventLabel::from("Normal"), EventLabel::Normal);
        assert_eq!(
            EventLabel::from("Unknown"),
            EventLabel::Other("Unknown".to_string())
        );
        assert_eq!(EventLabel::RareEvent.to_string(), "Rare Event");
    }

    #[test]
    fn test_classify_confidence_format() {
        let response: ClassifyResponse =
            serde_json::from_str(r#"{"label": "Rare Event", "similarity": 0.8342}"#).unwrap();
        assert!(response.is_rare_event());
        assert_eq!(response.confidence(), "83.4%");
        assert!(response.all_similarities.is_empty());
    }

    #[test]
    fn test_health_minimal_body() {
        let health: HealthResponse = serde_json::from_str(r#"{"device": "cpu"}"#).unwrap();
        assert_eq!(health.device, "cpu");
        assert!(health.models_loaded.is_none());
        assert!(health.reference_count.is_none());
    }

    #[test]
    fn test_health_full_body() {
        let health: HealthResponse = serde_json::from_str(
            r#"{
                "status": "healthy",
                "device": "cuda",
                "models_loaded": {"clip": true, "blip": true, "stable_diffusion": false},
                "reference_count": 4
            }"#,
        )
        .unwrap();
        let models = health.models_loaded.unwrap();
        assert!(models.clip);
        assert!(!models.all());
        assert_eq!(health.reference_count, Some(4));
    }

    #[test]
    fn test_error_detail_string_and_structured() {
        let plain: ErrorResponse =
            serde_json::from_str(r#"{"detail": "Number of files must match number of captions"}"#)
                .unwrap();
        assert_eq!(
            plain.detail_message().as_deref(),
            Some("Number of files must match number of captions")
        );

        let structured: ErrorResponse =
            serde_json::from_str(r#"{"detail": [{"loc": ["body", "file"], "msg": "field required"}]}"#)
                .unwrap();
        let msg = structured.detail_message().unwrap();
        assert!(msg.contains("field required"));

        let empty: ErrorResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.detail_message().is_none());
    }
}
