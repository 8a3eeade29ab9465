use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::encoder::UploadedFile;
use crate::error::{AnalysisError, Result};

/// Tri-state severity attached to each interpreted test value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusColor {
    Green,
    Yellow,
    Red,
}

/// Interpretation of a single lab test as returned by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub value: f64,
    pub unit: Option<String>,
    pub reference_range_used: Option<String>,
    pub status_color: StatusColor,
    pub uncertain: bool,
    pub short_explanation: String,
    pub long_explanation: String,
    pub suggested_next_steps: String,
}

/// Raw value extracted from the report before interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedValue {
    pub value: f64,
    pub unit: Option<String>,
    pub lab_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_values: Option<BTreeMap<String, ParsedValue>>,
    pub tests: BTreeMap<String, TestResult>,
    pub overall_summary: String,
    pub safety_notice: String,
}

impl AnalysisResponse {
    /// Parse and validate the model's JSON text.
    ///
    /// Tolerates a surrounding ```json fence. Anything that does not match the
    /// declared schema is reported as [`AnalysisError::MalformedResponse`].
    pub fn from_model_text(raw: &str) -> Result<Self> {
        let cleaned = strip_code_fence(raw);
        let response: AnalysisResponse = serde_json::from_str(cleaned)?;
        response.validate()?;
        Ok(response)
    }

    fn validate(&self) -> Result<()> {
        if self.tests.keys().any(|key| key.trim().is_empty()) {
            return Err(AnalysisError::MalformedResponse(
                "test entry with an empty name".to_string(),
            ));
        }
        Ok(())
    }

    pub fn count_with_status(&self, status: StatusColor) -> usize {
        self.tests
            .values()
            .filter(|t| t.status_color == status)
            .count()
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// One submission from the input form
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub free_text: String,
    pub file: Option<UploadedFile>,
}

impl AnalysisRequest {
    pub fn new(free_text: impl Into<String>, file: Option<UploadedFile>) -> Self {
        Self {
            free_text: free_text.into(),
            file,
        }
    }

    pub fn from_text(free_text: impl Into<String>) -> Self {
        Self::new(free_text, None)
    }

    pub fn has_text(&self) -> bool {
        !self.free_text.trim().is_empty()
    }

    /// At least one of text or file must be present for a submission to count.
    pub fn is_empty(&self) -> bool {
        !self.has_text() && self.file.is_none()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const LIPID_RESPONSE: &str = r#"{
        "parsed_values": {
            "LDL": { "value": 140, "unit": "mg/dL", "lab_range": null },
            "HDL": { "value": 35, "unit": "mg/dL", "lab_range": null }
        },
        "tests": {
            "LDL": {
                "value": 140,
                "unit": "mg/dL",
                "reference_range_used": "<100 optimal; 130-159 borderline high",
                "status_color": "Yellow",
                "uncertain": false,
                "short_explanation": "Your LDL is borderline high.",
                "long_explanation": "LDL at 140 mg/dL sits in the borderline high band.",
                "suggested_next_steps": "Discuss with clinician and consider lifestyle steps."
            },
            "HDL": {
                "value": 35,
                "unit": "mg/dL",
                "reference_range_used": "<40 low (men)",
                "status_color": "Red",
                "uncertain": false,
                "short_explanation": "Your HDL is low.",
                "long_explanation": "HDL below 40 mg/dL is considered low.",
                "suggested_next_steps": "Discuss with clinician."
            }
        },
        "overall_summary": "One value is borderline and one is low.",
        "safety_notice": "This is not medical advice."
    }"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::LIPID_RESPONSE;
    use super::*;

    #[test]
    fn parses_full_response() {
        let response = AnalysisResponse::from_model_text(LIPID_RESPONSE).unwrap();

        assert_eq!(response.tests.len(), 2);
        assert_eq!(response.count_with_status(StatusColor::Red), 1);
        assert_eq!(response.count_with_status(StatusColor::Yellow), 1);
        assert_eq!(response.count_with_status(StatusColor::Green), 0);

        let ldl = &response.tests["LDL"];
        assert_eq!(ldl.value, 140.0);
        assert_eq!(ldl.unit.as_deref(), Some("mg/dL"));
        assert_eq!(response.parsed_values.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn accepts_fenced_json_without_parsed_values() {
        let raw = "```json\n{\"tests\":{},\"overall_summary\":\"None\",\"safety_notice\":\"n/a\"}\n```";
        let response = AnalysisResponse::from_model_text(raw).unwrap();
        assert!(response.tests.is_empty());
        assert!(response.parsed_values.is_none());
    }

    #[test]
    fn rejects_response_missing_tests() {
        let raw = r#"{"overall_summary":"x","safety_notice":"y"}"#;
        let err = AnalysisResponse::from_model_text(raw).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_unknown_status_color() {
        let raw = LIPID_RESPONSE.replace("\"Yellow\"", "\"Orange\"");
        let err = AnalysisResponse::from_model_text(&raw).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_blank_test_name() {
        let raw = LIPID_RESPONSE.replace("\"HDL\"", "\"  \"");
        let err = AnalysisResponse::from_model_text(&raw).unwrap_err();
        assert!(
            matches!(&err, AnalysisError::MalformedResponse(m) if m.contains("empty name")),
            "{err}"
        );
    }

    #[test]
    fn rejects_non_json_text() {
        let err = AnalysisResponse::from_model_text("Sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn empty_request_detection_trims_text() {
        assert!(AnalysisRequest::from_text("   \n").is_empty());
        assert!(!AnalysisRequest::from_text("LDL 140").is_empty());
    }
}
