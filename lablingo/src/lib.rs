pub mod client;
pub mod controller;
pub mod credential;
pub mod encoder;
pub mod error;
pub mod models;
pub mod presentation;
pub mod prompt;

// Re-export commonly used types
pub use client::{GeminiClient, GeminiConfig, LabAnalyzer};
pub use controller::{ACCESS_DENIED_MESSAGE, ANALYSIS_FAILED_MESSAGE, Controller, UiState};
pub use credential::{CredentialGate, EnvCredentialGate};
pub use encoder::{EncodeSlot, EncodeTicket, MediaType, UploadedFile, encode};
pub use error::{AnalysisError, EncodeError, GateError, Result};
pub use models::{AnalysisRequest, AnalysisResponse, ParsedValue, StatusColor, TestResult};
pub use presentation::{FormInput, ReportView, TestCard, View};
