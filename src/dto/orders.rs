use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::FieldError,
    models::{Order, OrderItem, StatusHistoryEntry},
    status::OrderStatus,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub delivery_address: String,
    pub phone_number: String,
    pub notes: Option<String>,
}

impl CheckoutRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.delivery_address.trim().is_empty() {
            errors.push(FieldError::new(
                "delivery_address",
                "Delivery address is required.",
            ));
        }
        let phone = self.phone_number.trim();
        if phone.is_empty() {
            errors.push(FieldError::new(
                "phone_number",
                "Phone number is required for delivery.",
            ));
        } else if phone.len() > 20 {
            errors.push(FieldError::new(
                "phone_number",
                "Phone number must be at most 20 characters.",
            ));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub status_history: Vec<StatusHistoryEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// Counts over the caller's own orders.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStats {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub completed_orders: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_requires_address_and_phone() {
        let request = CheckoutRequest {
            delivery_address: "   ".into(),
            phone_number: String::new(),
            notes: None,
        };
        let errors = request.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["delivery_address", "phone_number"]);
    }

    #[test]
    fn checkout_accepts_missing_notes() {
        let request = CheckoutRequest {
            delivery_address: "12 Marina Road".into(),
            phone_number: "08012345678".into(),
            notes: None,
        };
        assert!(request.validate().is_ok());
    }
}
