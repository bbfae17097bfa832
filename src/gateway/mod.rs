//! Remote REST gateway backing validation and terminal submission.
//!
//! The wizard only talks to the gateway through the [`Gateway`] trait, so the
//! HTTP client can be swapped for a stub in tests.

pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::GatewayError;

pub use http::HttpGateway;

pub const EMAIL_PATH: &str = "/users/email";
pub const OTP_PATH: &str = "/users/email/otp";
pub const ORGANIZATIONS_PATH: &str = "/organizations";

/// `type` sent by the OTP endpoint when the email was never registered.
pub const EMAIL_NOT_REGISTERED: &str = "EMAIL_NOT_REGISTERED";

/// Endpoints the onboarding wizard consumes.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `POST /users/email`: 2xx means the address is available and a code was sent.
    async fn register_email(&self, email: &str) -> Result<(), GatewayError>;

    /// `GET /users/email/otp?email=&otp=`: 2xx means the code is correct.
    async fn verify_otp(&self, email: &str, otp: &str) -> Result<(), GatewayError>;

    /// `POST /organizations`: persists the full answer set; returns the created record.
    async fn create_organization(&self, payload: &Value) -> Result<Value, GatewayError>;
}

/// JSON error body returned with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl ApiErrorBody {
    /// Parse an error body; anything that is not the expected JSON yields empty fields.
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}
