//! Payment provider boundary.
//!
//! The reconciler only talks to [`PaymentGateway`]. Amounts everywhere in the
//! service, including across this boundary, are integers in the currency's
//! minor unit (kobo for NGN), which is what Paystack expects on the wire.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub mod paystack;
pub mod signature;

pub use paystack::PaystackClient;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Transport(String),

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct InitializeRequest {
    pub email: String,
    /// Minor currency units.
    pub amount: i64,
    pub reference: String,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub success: bool,
    /// Provider's own status string, e.g. `success`, `failed`, `abandoned`.
    pub raw_status: String,
    /// Amount the provider says was captured, in minor units.
    pub amount: Option<i64>,
    pub message: String,
}

impl Verification {
    /// The provider has settled the transaction as not paid. Anything that is
    /// neither a success nor a decline is still in flight; `abandoned` only
    /// means the customer has not finished the checkout page yet.
    pub fn is_declined(&self) -> bool {
        !self.success && matches!(self.raw_status.as_str(), "failed" | "reversed")
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: InitializeRequest) -> Result<Authorization, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError>;
}

/// `125050` -> `"1250.50"`.
pub fn format_amount(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// `{event, data}` body delivered to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    pub reference: Option<String>,
    pub amount: Option<i64>,
    pub status: Option<String>,
    pub gateway_response: Option<String>,
}

pub const CHARGE_SUCCESS: &str = "charge.success";
pub const CHARGE_FAILED: &str = "charge.failed";
