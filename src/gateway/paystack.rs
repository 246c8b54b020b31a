use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};

use crate::config::GatewayConfig;

use super::{Authorization, GatewayError, InitializeRequest, PaymentGateway, Verification};

/// REST client for Paystack's transaction initialize/verify endpoints.
#[derive(Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

/// Every Paystack response is wrapped in `{status, message, data}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: Option<i64>,
    gateway_response: Option<String>,
}

impl PaystackClient {
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Envelope<T>, GatewayError> {
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        match serde_json::from_slice::<Envelope<T>>(&body) {
            Ok(envelope) if status.is_success() => Ok(envelope),
            Ok(envelope) => Err(GatewayError::Rejected(envelope.message)),
            Err(_) if !status.is_success() => {
                Err(GatewayError::Rejected(format!("gateway returned {status}")))
            }
            Err(err) => Err(GatewayError::Transport(format!(
                "unreadable gateway response: {err}"
            ))),
        }
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(&self, request: InitializeRequest) -> Result<Authorization, GatewayError> {
        let mut payload = serde_json::json!({
            "email": request.email,
            "amount": request.amount,
            "reference": request.reference,
        });
        if let Some(callback_url) = &request.callback_url {
            payload["callback_url"] = serde_json::json!(callback_url);
        }

        tracing::info!(reference = %request.reference, amount = request.amount, "initializing gateway transaction");
        let response = self
            .http
            .post(self.url("/transaction/initialize"))
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let envelope = Self::read_envelope::<InitializeData>(response).await?;
        match envelope.data {
            Some(data) if envelope.status => Ok(Authorization {
                authorization_url: data.authorization_url,
                access_code: data.access_code,
                reference: data.reference,
            }),
            _ if envelope.message.is_empty() => Err(GatewayError::Rejected(
                "Failed to initialize transaction".into(),
            )),
            _ => Err(GatewayError::Rejected(envelope.message)),
        }
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        tracing::info!(%reference, "verifying gateway transaction");
        let response = self
            .http
            .get(self.url(&format!("/transaction/verify/{reference}")))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(transport_error)?;

        let envelope = Self::read_envelope::<VerifyData>(response).await?;
        let Some(data) = envelope.data.filter(|_| envelope.status) else {
            return Err(GatewayError::Rejected(envelope.message));
        };
        let message = data
            .gateway_response
            .clone()
            .unwrap_or_else(|| envelope.message.clone());
        Ok(Verification {
            success: data.status == "success",
            amount: data.amount,
            raw_status: data.status,
            message,
        })
    }
}
