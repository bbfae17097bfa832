//! Error types for the onboarding wizard.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failures talking to the remote REST gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a response (connect error, timeout, ...).
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The server answered with a non-2xx status.
    #[error("{endpoint} rejected the request with status {status}")]
    Rejected {
        endpoint: String,
        status: u16,
        /// `type` field of the JSON error body, if any.
        kind: Option<String>,
        /// `message` field of the JSON error body, if any.
        message: Option<String>,
    },

    /// 2xx, but the body was not what the endpoint promises.
    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },
}

impl GatewayError {
    /// Whether a blind re-submission may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::InvalidResponse { .. } | Self::Timeout { .. } => true,
            Self::Rejected { status, .. } => *status >= 500,
        }
    }

    /// The `type` discriminator of a rejection body.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Rejected { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }

    /// The server-provided `message` of a rejection body.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Local (synchronous) validation failures. `Display` is the user-facing text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required.")]
    Required { field: String },

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Please enter the verification code.")]
    MissingCode,

    #[error("Please enter a valid phone number: {reason}.")]
    InvalidPhone { reason: String },

    #[error("Password must be at least 8 characters and contain an uppercase letter and a digit.")]
    WeakPassword { strength: u8 },

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error("{email} is not a valid email address.")]
    InvalidInvite { email: String },
}

/// Errors returned by the wizard's command entry point.
///
/// None of these escape the current step: the manager records the message in
/// the wizard's `error` slot where it applies and hands the error back.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("A request for this step is already in flight")]
    Busy,

    #[error("Step is blocked until the error is cleared: {0}")]
    Blocked(String),

    #[error("The wizard is already complete")]
    AlreadyComplete,

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{command} is not available on step {step}")]
    NotAvailable { command: String, step: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A remote check or submission failed; `message` is what the user sees.
    #[error("{message}")]
    Remote {
        message: String,
        #[source]
        source: GatewayError,
    },

    #[error("Invalid verification code.")]
    CodeMismatch,

    /// The wizard was cancelled or reset while the request was in flight.
    #[error("The wizard session changed while the request was in flight")]
    Cancelled,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
