use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::Payment,
    status::{OrderPaymentStatus, OrderStatus, PaymentStatus},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitializePaymentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentLink {
    pub payment_url: String,
    pub access_code: String,
    pub reference: String,
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub reference: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderPaymentSummary {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub is_paid: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResult {
    pub payment: Payment,
    pub order: OrderPaymentSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusCheck {
    pub reference: String,
    pub status: PaymentStatus,
    pub is_successful: bool,
    pub order_id: Uuid,
    pub order_number: String,
}

/// What a webhook delivery did. Every variant is acknowledged with 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    PaymentConfirmed,
    AlreadyProcessed,
    PaymentNotFound,
    AmountMismatch,
    FailureRecorded,
    Ignored,
}

impl WebhookOutcome {
    pub fn message(self) -> &'static str {
        match self {
            WebhookOutcome::PaymentConfirmed => "Payment processed successfully",
            WebhookOutcome::AlreadyProcessed => "Payment already processed",
            WebhookOutcome::PaymentNotFound => "Payment not found",
            WebhookOutcome::AmountMismatch => "Payment amount does not match order total",
            WebhookOutcome::FailureRecorded => "Payment failure recorded",
            WebhookOutcome::Ignored => "Webhook received",
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub outcome: WebhookOutcome,
}
