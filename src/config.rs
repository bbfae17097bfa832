//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::onboarding::Flow;

/// Upper bound on terminal submission attempts: the first try plus one retry.
pub const MAX_SUBMIT_ATTEMPTS: u32 = 2;

/// Connection settings for the REST gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://api.example.com/v1`. No trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bearer token sent with every request, if set.
    pub api_token: Option<SecretString>,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(15),
            api_token: None,
        }
    }
}

/// Wizard configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Which onboarding flow variant to run.
    pub flow: Flow,
    /// Total attempts for the terminal submission (1..=MAX_SUBMIT_ATTEMPTS).
    pub submit_attempts: u32,
    /// When set, the verification code is compared against this value
    /// locally instead of asking the gateway.
    pub fixed_code: Option<String>,
    pub gateway: GatewayConfig,
}

impl WizardConfig {
    pub fn new(gateway: GatewayConfig) -> Self {
        Self {
            flow: Flow::default(),
            submit_attempts: MAX_SUBMIT_ATTEMPTS,
            fixed_code: None,
            gateway,
        }
    }

    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (env-var names as keys).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("CARE_API_BASE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("CARE_API_BASE_URL".into()))?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "CARE_API_BASE_URL".into(),
                message: format!("expected an http(s) URL, got {base_url}"),
            });
        }

        let mut gateway = GatewayConfig::new(base_url.trim());

        if let Some(raw) = lookup("CARE_API_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "CARE_API_TIMEOUT_SECS".into(),
                message: format!("not a number of seconds: {raw}"),
            })?;
            gateway.timeout = Duration::from_secs(secs.max(1));
        }

        gateway.api_token = lookup("CARE_API_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        let flow = match lookup("CARE_ONBOARD_FLOW") {
            Some(raw) => raw.parse::<Flow>().map_err(|message| ConfigError::InvalidValue {
                key: "CARE_ONBOARD_FLOW".into(),
                message,
            })?,
            None => Flow::default(),
        };

        let submit_attempts = lookup("CARE_ONBOARD_SUBMIT_ATTEMPTS")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(MAX_SUBMIT_ATTEMPTS)
            .clamp(1, MAX_SUBMIT_ATTEMPTS);

        let fixed_code = lookup("CARE_ONBOARD_FIXED_CODE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            flow,
            submit_attempts,
            fixed_code,
            gateway,
        })
    }
}
