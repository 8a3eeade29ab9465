use lablingo::{
    GeminiConfig,
    client::{DEFAULT_API_KEY_VAR, DEFAULT_BASE_URL, DEFAULT_MODEL},
};
use std::{str::FromStr, time::Duration};
use tracing::warn;

const FALLBACK_API_KEY_VAR: &str = "API_KEY";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_UPLOAD_MB: usize = 20;
const DEFAULT_SESSION_IDLE_MINUTES: u64 = 30;

/// Which credential gate the service runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Check the API key environment variable
    Env,
    /// No gate: always treated as credentialed
    None,
}

impl FromStr for GateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "env" => Ok(GateMode::Env),
            "none" | "off" => Ok(GateMode::None),
            other => Err(format!("unknown credential gate mode `{}`", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub api_key_var: String,
    pub model: String,
    pub base_url: String,
    pub gate_mode: GateMode,
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are dropped; `None` keeps them forever.
    pub session_idle_ttl: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            gate_mode: GateMode::Env,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            session_idle_ttl: idle_ttl(DEFAULT_SESSION_IDLE_MINUTES),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();

        let api_key_var = if lookup(DEFAULT_API_KEY_VAR).is_none()
            && lookup(FALLBACK_API_KEY_VAR).is_some()
        {
            FALLBACK_API_KEY_VAR.to_string()
        } else {
            defaults.api_key_var
        };

        Self {
            port: parse_or(&lookup, "PORT", defaults.port),
            api_key_var,
            model: lookup("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: lookup("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            gate_mode: parse_or(&lookup, "CREDENTIAL_GATE", defaults.gate_mode),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)
                * 1024
                * 1024,
            session_idle_ttl: idle_ttl(parse_or(
                &lookup,
                "SESSION_IDLE_MINUTES",
                DEFAULT_SESSION_IDLE_MINUTES,
            )),
        }
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key_var: self.api_key_var.clone(),
            api_key: None,
        }
    }
}

/// Zero minutes disables eviction.
fn idle_ttl(minutes: u64) -> Option<Duration> {
    (minutes > 0).then(|| Duration::from_secs(minutes.saturating_mul(60)))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!(key, value = %raw, error = %e, "Invalid setting, using default");
            default
        }),
        None => default,
    }
}
