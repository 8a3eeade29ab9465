use serde::Serialize;

use crate::{
    controller::UiState,
    encoder::MediaType,
    models::{AnalysisResponse, StatusColor, TestResult},
};

pub const BILLING_DOCS_URL: &str = "https://ai.google.dev/gemini-api/docs/billing";

const DEFAULT_RANGE_LABEL: &str = "Default Standard Range";
const UNCERTAIN_NOTICE: &str =
    "The unit or value was ambiguous in the source. Please verify with the original report.";
const NO_TESTS_MESSAGE: &str = "No valid test data found to analyze.";

/// What the page shows for a given controller state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Loading,
    CredentialRequired {
        title: String,
        message: String,
        error: Option<String>,
        billing_url: String,
    },
    Form {
        error: Option<Banner>,
        analyzing: bool,
        submit_enabled: bool,
        accepted_types: String,
    },
    Report(ReportView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportView {
    pub summary: String,
    pub safety_notice: String,
    pub total: usize,
    pub attention_count: usize,
    pub borderline_count: usize,
    pub cards: Vec<TestCard>,
    pub empty_message: Option<String>,
}

/// One expandable result card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCard {
    pub key: String,
    pub title: String,
    pub value: f64,
    pub unit: Option<String>,
    pub status: StatusColor,
    pub badge: &'static str,
    pub uncertain: bool,
    pub uncertain_notice: Option<&'static str>,
    pub short_explanation: String,
    pub long_explanation: String,
    pub reference_range: String,
    pub next_steps: String,
}

impl StatusColor {
    pub fn badge_label(&self) -> &'static str {
        match self {
            StatusColor::Green => "Normal",
            StatusColor::Yellow => "Borderline",
            StatusColor::Red => "Attention Needed",
        }
    }
}

impl View {
    /// Project the controller state, plus whatever the form already holds,
    /// into a view.
    pub fn from_state(state: &UiState, form: &FormInput) -> Self {
        match state {
            UiState::CheckingCredential => View::Loading,
            UiState::NeedsCredential { message } => View::CredentialRequired {
                title: "API Key Required".to_string(),
                message: "To use LabLingo, you need to select a Google Cloud API key for the Gemini API."
                    .to_string(),
                error: message.clone(),
                billing_url: BILLING_DOCS_URL.to_string(),
            },
            UiState::Idle { error } => View::Form {
                error: error.as_ref().map(|message| Banner {
                    title: "Analysis Failed".to_string(),
                    message: message.clone(),
                }),
                analyzing: false,
                submit_enabled: form.submit_enabled(false),
                accepted_types: MediaType::accept_list(),
            },
            UiState::Analyzing => View::Form {
                error: None,
                analyzing: true,
                submit_enabled: form.submit_enabled(true),
                accepted_types: MediaType::accept_list(),
            },
            UiState::Result { response } => View::Report(ReportView::from_response(response)),
        }
    }
}

impl ReportView {
    pub fn from_response(response: &AnalysisResponse) -> Self {
        let cards: Vec<TestCard> = response
            .tests
            .iter()
            .map(|(key, test)| TestCard::new(key, test))
            .collect();

        Self {
            summary: response.overall_summary.clone(),
            safety_notice: response.safety_notice.clone(),
            total: cards.len(),
            attention_count: response.count_with_status(StatusColor::Red),
            borderline_count: response.count_with_status(StatusColor::Yellow),
            empty_message: cards.is_empty().then(|| NO_TESTS_MESSAGE.to_string()),
            cards,
        }
    }
}

impl TestCard {
    fn new(key: &str, test: &TestResult) -> Self {
        Self {
            key: key.to_string(),
            title: key.replace('_', " "),
            value: test.value,
            unit: test.unit.clone(),
            status: test.status_color,
            badge: test.status_color.badge_label(),
            uncertain: test.uncertain,
            uncertain_notice: test.uncertain.then_some(UNCERTAIN_NOTICE),
            short_explanation: test.short_explanation.clone(),
            long_explanation: test.long_explanation.clone(),
            reference_range: test
                .reference_range_used
                .clone()
                .unwrap_or_else(|| DEFAULT_RANGE_LABEL.to_string()),
            next_steps: test.suggested_next_steps.clone(),
        }
    }
}

/// Input form contents before submission
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    pub text: String,
    pub file: Option<MediaType>,
}

impl FormInput {
    /// The submit button is disabled with nothing to send or a request in flight.
    pub fn submit_enabled(&self, analyzing: bool) -> bool {
        !analyzing && (!self.text.trim().is_empty() || self.file.is_some())
    }
}
