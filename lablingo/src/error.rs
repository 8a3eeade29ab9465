use thiserror::Error;

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// User-visible text for a rejected upload.
pub const UNSUPPORTED_FILE_MESSAGE: &str =
    "Please upload a supported file (PDF, JPEG, PNG, WEBP, HEIC).";

/// Errors raised while turning a selected file into an upload
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("The selected file is empty")]
    EmptyFile,

    #[error("File encoding was interrupted: {0}")]
    Interrupted(String),
}

impl EncodeError {
    /// Message safe to show next to the file picker.
    pub fn user_message(&self) -> &'static str {
        match self {
            EncodeError::UnsupportedMediaType(_) => UNSUPPORTED_FILE_MESSAGE,
            EncodeError::EmptyFile => "The selected file is empty. Please choose another file.",
            EncodeError::Interrupted(_) => "We couldn't read that file. Please try again.",
        }
    }
}

/// Errors raised by the analysis client
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No input provided")]
    NoInput,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Credential rejected: {0}")]
    Credential(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl AnalysisError {
    /// Whether this failure should send the user back to credential selection.
    ///
    /// Besides the dedicated variant, a transport failure whose text mentions
    /// a 403, a permission problem or a missing entity counts, since the
    /// service reports revoked or unknown keys that way. Parse errors never
    /// count, whatever the model's output happened to contain.
    pub fn is_credential_failure(&self) -> bool {
        match self {
            AnalysisError::Credential(_) => true,
            AnalysisError::Transport(text) => {
                let text = text.to_lowercase();
                text.contains("403") || text.contains("permission") || text.contains("not found")
            }
            AnalysisError::NoInput | AnalysisError::MalformedResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::MalformedResponse(err.to_string())
    }
}

/// Errors raised by a credential gate
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Credential capability unavailable: {0}")]
    Unavailable(String),

    #[error("Credential selection failed: {0}")]
    SelectionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_markers_are_detected_in_transport_errors() {
        assert!(AnalysisError::Credential("bad key".into()).is_credential_failure());
        assert!(AnalysisError::Transport("HTTP 403 Forbidden".into()).is_credential_failure());
        assert!(
            AnalysisError::Transport("The caller does not have permission".into())
                .is_credential_failure()
        );
        assert!(
            AnalysisError::Transport("Requested entity was not found.".into())
                .is_credential_failure()
        );
        assert!(
            AnalysisError::Transport("status PERMISSION_DENIED".into()).is_credential_failure()
        );
    }

    #[test]
    fn other_failures_are_not_credential_failures() {
        assert!(!AnalysisError::Transport("HTTP 500 Internal".into()).is_credential_failure());
        assert!(!AnalysisError::MalformedResponse("missing field `tests`".into())
            .is_credential_failure());
        assert!(!AnalysisError::NoInput.is_credential_failure());
    }

    #[test]
    fn parse_errors_never_count_as_credential_failures() {
        let position = serde_json::from_str::<f64>(&format!("{}x", " ".repeat(402))).unwrap_err();
        assert!(position.to_string().contains("column 403"), "{position}");
        assert!(!AnalysisError::from(position).is_credential_failure());

        let quoted = serde_json::from_str::<f64>(r#""not found""#).unwrap_err();
        assert!(!AnalysisError::from(quoted).is_credential_failure());

        assert!(
            !AnalysisError::MalformedResponse("permission to read field denied".into())
                .is_credential_failure()
        );
    }

    #[test]
    fn unsupported_type_keeps_user_message_separate() {
        let err = EncodeError::UnsupportedMediaType("text/plain".into());
        assert_eq!(err.user_message(), UNSUPPORTED_FILE_MESSAGE);
        assert!(err.to_string().contains("text/plain"));
    }
}
