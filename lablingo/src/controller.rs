//! Application controller: the form's state machine.
//!
//! ```text
//! CheckingCredential ──present / gate error / no gate──▶ Idle
//!        │ absent                                        │ ▲ submit / reset
//!        ▼                                               ▼ │
//! NeedsCredential ◀──credential failure── Analyzing ──ok──▶ Result
//!        │ select (any outcome)             │ other failure
//!        └──────────────▶ Idle ◀────────────┘
//! ```
//!
//! Transitions are plain state updates. The only side effects, the gate and
//! the analyzer, are supplied by the caller.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    credential::CredentialGate,
    error::AnalysisError,
    models::{AnalysisRequest, AnalysisResponse},
};

pub const ACCESS_DENIED_MESSAGE: &str = "Access denied. Please select a valid API Key to continue.";
pub const ANALYSIS_FAILED_MESSAGE: &str = "We couldn't analyze that report. Please ensure the file is a clear image or PDF, or try pasting the text values directly.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UiState {
    CheckingCredential,
    NeedsCredential { message: Option<String> },
    Idle { error: Option<String> },
    Analyzing,
    Result { response: AnalysisResponse },
}

#[derive(Debug, Clone)]
pub struct Controller {
    state: UiState,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            state: UiState::CheckingCredential,
        }
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self.state, UiState::Analyzing)
    }

    pub fn result(&self) -> Option<&AnalysisResponse> {
        match &self.state {
            UiState::Result { response } => Some(response),
            _ => None,
        }
    }

    /// Initial credential query. A missing gate means the host always has a
    /// credential; a failing gate fails open.
    pub async fn check_credential(&mut self, gate: Option<&dyn CredentialGate>) {
        if !matches!(self.state, UiState::CheckingCredential) {
            return;
        }

        let Some(gate) = gate else {
            self.state = UiState::Idle { error: None };
            return;
        };

        self.state = match gate.has_credential().await {
            Ok(true) => UiState::Idle { error: None },
            Ok(false) => {
                info!("No credential configured, asking the user to select one");
                UiState::NeedsCredential { message: None }
            }
            Err(e) => {
                error!(error = %e, "Error checking API key status");
                UiState::Idle { error: None }
            }
        };
    }

    /// Delegate selection to the gate, then assume it worked.
    ///
    /// The picker can close before the host reports the new key, so the
    /// outcome is only logged.
    pub async fn select_credential(&mut self, gate: Option<&dyn CredentialGate>) {
        if !matches!(self.state, UiState::NeedsCredential { .. }) {
            return;
        }

        if let Some(gate) = gate {
            if let Err(e) = gate.select_credential().await {
                warn!(error = %e, "Error selecting key");
            }
        }

        self.state = UiState::Idle { error: None };
    }

    /// Only the idle form takes new submissions.
    pub fn accepts_submissions(&self) -> bool {
        matches!(self.state, UiState::Idle { .. })
    }

    pub fn can_submit(&self, request: &AnalysisRequest) -> bool {
        self.accepts_submissions() && !request.is_empty()
    }

    /// Move to `Analyzing` and hand the request back to the caller.
    ///
    /// Returns `None`, leaving the state untouched, for empty submissions or
    /// when the form is not idle.
    pub fn begin_analysis(&mut self, request: AnalysisRequest) -> Option<AnalysisRequest> {
        if !self.can_submit(&request) {
            return None;
        }
        self.state = UiState::Analyzing;
        Some(request)
    }

    /// Record the outcome of the request started by [`Self::begin_analysis`].
    pub fn complete_analysis(&mut self, outcome: Result<AnalysisResponse, AnalysisError>) {
        if !self.is_analyzing() {
            warn!("Dropping analysis outcome received outside of Analyzing");
            return;
        }

        self.state = match outcome {
            Ok(response) => UiState::Result { response },
            Err(e) if e.is_credential_failure() => {
                error!(error = %e, "Analysis rejected for authorization reasons");
                UiState::NeedsCredential {
                    message: Some(ACCESS_DENIED_MESSAGE.to_string()),
                }
            }
            Err(e) => {
                error!(error = %e, "Analysis failed");
                UiState::Idle {
                    error: Some(ANALYSIS_FAILED_MESSAGE.to_string()),
                }
            }
        };
    }

    /// Drop the result and any error, back to an empty form.
    pub fn reset(&mut self) {
        if matches!(self.state, UiState::Result { .. } | UiState::Idle { .. }) {
            self.state = UiState::Idle { error: None };
        }
    }
}
