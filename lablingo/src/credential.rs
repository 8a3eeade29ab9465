use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::GateError;

/// Host capability that knows whether an API credential is configured
#[async_trait]
pub trait CredentialGate: Send + Sync {
    async fn has_credential(&self) -> Result<bool, GateError>;

    /// Let the user pick a credential. Callers must not rely on the outcome.
    async fn select_credential(&self) -> Result<(), GateError>;
}

/// Gate backed by an environment variable
#[derive(Debug, Clone)]
pub struct EnvCredentialGate {
    var: String,
}

impl EnvCredentialGate {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    fn is_set(&self) -> bool {
        std::env::var(&self.var)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }
}

#[async_trait]
impl CredentialGate for EnvCredentialGate {
    async fn has_credential(&self) -> Result<bool, GateError> {
        Ok(self.is_set())
    }

    async fn select_credential(&self) -> Result<(), GateError> {
        if self.is_set() {
            info!(var = %self.var, "Credential available");
            Ok(())
        } else {
            warn!(var = %self.var, "Credential still not configured");
            Err(GateError::SelectionFailed(format!(
                "{} environment variable not set",
                self.var
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unset_variable_reports_missing_credential() {
        let gate = EnvCredentialGate::new("LABLINGO_GATE_TEST_VAR_NEVER_SET");

        assert!(!gate.has_credential().await.unwrap());
        assert!(matches!(
            gate.select_credential().await,
            Err(GateError::SelectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn set_variable_reports_credential() {
        // PATH is present in every test environment.
        let gate = EnvCredentialGate::new("PATH");

        assert!(gate.has_credential().await.unwrap());
        assert!(gate.select_credential().await.is_ok());
    }
}
