//! HTTP gateway — reqwest client for the onboarding endpoints.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;

use super::{ApiErrorBody, EMAIL_PATH, Gateway, ORGANIZATIONS_PATH, OTP_PATH};
use crate::config::GatewayConfig;
use crate::error::{ConfigError, GatewayError};

/// Gateway over the product's REST API.
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_token {
            Some(ref token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let resp = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout: self.config.timeout,
                }
            } else {
                GatewayError::Transport {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let parsed = ApiErrorBody::parse(&body);
        tracing::debug!(
            endpoint,
            status = status.as_u16(),
            kind = ?parsed.kind,
            "Gateway rejected request"
        );
        Err(GatewayError::Rejected {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            kind: parsed.kind,
            message: parsed.message,
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn register_email(&self, email: &str) -> Result<(), GatewayError> {
        let request = self
            .client
            .post(self.url(EMAIL_PATH))
            .json(&serde_json::json!({ "email": email }));
        self.send(EMAIL_PATH, request).await?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<(), GatewayError> {
        let request = self
            .client
            .get(self.url(OTP_PATH))
            .query(&[("email", email), ("otp", otp)]);
        self.send(OTP_PATH, request).await?;
        Ok(())
    }

    async fn create_organization(&self, payload: &Value) -> Result<Value, GatewayError> {
        let request = self.client.post(self.url(ORGANIZATIONS_PATH)).json(payload);
        let resp = self.send(ORGANIZATIONS_PATH, request).await?;
        resp.json::<Value>()
            .await
            .map_err(|e| GatewayError::InvalidResponse {
                endpoint: ORGANIZATIONS_PATH.to_string(),
                reason: e.to_string(),
            })
    }
}
