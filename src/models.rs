// src/models.rs
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Focus requested by the user. Advisory only: it is logged and stored with
/// the analysis but the prompt schema is the same for every mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[default]
    Comprehensive,
    WasteDetection,
    Biodiversity,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Comprehensive => "comprehensive",
            AnalysisMode::WasteDetection => "waste_detection",
            AnalysisMode::Biodiversity => "biodiversity",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environmental_impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sustainability_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<String>,
}

impl DetectedObject {
    /// Lowercased name, empty when the model omitted it.
    pub fn lower_name(&self) -> String {
        self.name.as_deref().unwrap_or("").to_lowercase()
    }

    pub fn is_living(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|k| k.eq_ignore_ascii_case("living"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environmental_health_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biodiversity_level: Option<String>,
    #[serde(default)]
    pub key_concerns: Vec<String>,
    #[serde(default)]
    pub positive_aspects: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// The shape the model is asked to return. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects_detected: Option<Vec<DetectedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_analysis: Option<OverallAnalysis>,
}

/// Outcome of one scene analysis. Serialized untagged so clients see the
/// same keys the model produced: `error` marks a failure, `raw_analysis`
/// marks a reply that was not valid JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Error {
        error: String,
        debug_info: String,
    },
    Fallback {
        summary: String,
        raw_analysis: String,
        objects_detected: Vec<DetectedObject>,
        overall_analysis: OverallAnalysis,
    },
    Structured(SceneReport),
}

impl AnalysisResult {
    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisResult::Error { .. })
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            AnalysisResult::Error { .. } => "error",
            AnalysisResult::Fallback { .. } => "fallback",
            AnalysisResult::Structured(_) => "structured",
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            AnalysisResult::Error { .. } => None,
            AnalysisResult::Fallback { summary, .. } => Some(summary),
            AnalysisResult::Structured(report) => report.summary.as_deref(),
        }
    }

    /// `None` when the result carries no object list at all, which is not
    /// the same as an empty list.
    pub fn objects(&self) -> Option<&[DetectedObject]> {
        match self {
            AnalysisResult::Error { .. } => None,
            AnalysisResult::Fallback {
                objects_detected, ..
            } => Some(objects_detected),
            AnalysisResult::Structured(report) => report.objects_detected.as_deref(),
        }
    }

    pub fn overall(&self) -> Option<&OverallAnalysis> {
        match self {
            AnalysisResult::Error { .. } => None,
            AnalysisResult::Fallback {
                overall_analysis, ..
            } => Some(overall_analysis),
            AnalysisResult::Structured(report) => report.overall_analysis.as_ref(),
        }
    }

    pub fn raw_analysis(&self) -> Option<&str> {
        match self {
            AnalysisResult::Fallback { raw_analysis, .. } => Some(raw_analysis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForestDensity {
    DenseForest,
    ForestArea,
    IndividualTrees,
}

impl ForestDensity {
    pub fn from_count(forest_objects: usize) -> Self {
        if forest_objects >= 3 {
            ForestDensity::DenseForest
        } else if forest_objects >= 2 {
            ForestDensity::ForestArea
        } else {
            ForestDensity::IndividualTrees
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            ForestDensity::DenseForest => 4.0,
            ForestDensity::ForestArea => 2.5,
            ForestDensity::IndividualTrees => 1.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ForestDensity::DenseForest => "Dense Forest Ecosystem",
            ForestDensity::ForestArea => "Forest Area",
            ForestDensity::IndividualTrees => "Individual Trees",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    AtRisk,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        if score >= 70 {
            HealthStatus::Healthy
        } else if score >= 40 {
            HealthStatus::AtRisk
        } else {
            HealthStatus::Critical
        }
    }
}

/// Heuristic metrics derived from an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub co2_impact: f64,
    pub co2_breakdown: Vec<String>,
    pub forest_density: ForestDensity,
    pub health_score: u8,
    pub health_status: HealthStatus,
    pub biodiversity_pct: Option<f64>,
    pub living_count: usize,
    pub total_objects: usize,
    pub recommendations: [String; 3],
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredAnalysis {
    pub id: Uuid,
    pub mode: AnalysisMode,
    pub result: AnalysisResult,
    pub impact: Option<ImpactReport>,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now().format("%H:%M").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub analysis_count: u64,
    pub question_count: usize,
    pub has_image: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_variant_serializes_flat() {
        let result = AnalysisResult::Error {
            error: "Analysis failed: rate limit".into(),
            debug_info: "Error type: RateLimitError".into(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "error": "Analysis failed: rate limit",
                "debug_info": "Error type: RateLimitError"
            })
        );
    }

    #[test]
    fn missing_object_fields_are_omitted() {
        let obj = DetectedObject {
            name: Some("oak".into()),
            kind: Some("living".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&obj).unwrap(),
            json!({"name": "oak", "type": "living"})
        );
    }

    #[test]
    fn living_check_ignores_case() {
        let obj = DetectedObject {
            kind: Some("Living".into()),
            ..Default::default()
        };
        assert!(obj.is_living());
        assert!(!DetectedObject::default().is_living());
    }

    #[test]
    fn accessors_discriminate_variants() {
        let structured = AnalysisResult::Structured(SceneReport {
            summary: Some("a field".into()),
            objects_detected: None,
            overall_analysis: None,
        });
        assert_eq!(structured.summary(), Some("a field"));
        assert!(structured.objects().is_none());
        assert!(structured.raw_analysis().is_none());

        let error = AnalysisResult::Error {
            error: "x".into(),
            debug_info: "y".into(),
        };
        assert!(error.is_error());
        assert!(error.summary().is_none());
    }

    #[test]
    fn density_thresholds() {
        assert_eq!(ForestDensity::from_count(0), ForestDensity::IndividualTrees);
        assert_eq!(ForestDensity::from_count(2), ForestDensity::ForestArea);
        assert_eq!(ForestDensity::from_count(5).multiplier(), 4.0);
        assert_eq!(HealthStatus::from_score(70), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(39), HealthStatus::Critical);
    }
}
