use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{
        cart_items, foods, order_items, order_status_history, orders, payments, saved_cart_items,
        saved_carts,
    },
    status::{HistoryKind, OrderPaymentStatus, OrderStatus, PaymentStatus},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Food {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Minor currency units (kobo), as are all amounts in the API.
    pub price: i64,
    pub discount_price: Option<i64>,
    pub current_price: i64,
    pub is_available: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub food_id: Uuid,
    pub quantity: i32,
    pub price_snapshot: i64,
    pub line_total: i64,
    pub selected_variant: Option<String>,
    pub selected_addons: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SavedCartItem {
    pub id: Uuid,
    /// `None` once the food has been removed from the menu.
    pub food_id: Option<Uuid>,
    pub quantity: i32,
    pub price_snapshot: i64,
    pub selected_variant: Option<String>,
    pub selected_addons: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SavedCart {
    pub id: Uuid,
    pub name: String,
    pub items: Vec<SavedCartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub delivery_address: String,
    pub phone_number: String,
    pub delivery_notes: Option<String>,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub payment_reference: Option<String>,
    pub payment_method: String,
    pub total_amount: i64,
    pub paid_amount: i64,
    pub items_count: i32,
    pub is_paid: bool,
    pub can_be_cancelled: bool,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub food_id: Option<Uuid>,
    pub food_name: String,
    pub food_price: i64,
    pub quantity: i32,
    pub total_price: i64,
    pub selected_variant: Option<String>,
    pub selected_addons: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub kind: HistoryKind,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub changed_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub reference: String,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub is_successful: bool,
    pub authorization_url: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Addons are stored as a JSON array of names.
pub fn addons_from_json(value: &serde_json::Value) -> Vec<String> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

pub fn addons_to_json(addons: &[String]) -> serde_json::Value {
    serde_json::json!(addons)
}

impl From<foods::Model> for Food {
    fn from(model: foods::Model) -> Self {
        Self {
            current_price: model.current_price(),
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            discount_price: model.discount_price,
            is_available: model.is_available,
        }
    }
}

impl From<cart_items::Model> for CartItem {
    fn from(model: cart_items::Model) -> Self {
        Self {
            line_total: model.line_total(),
            selected_addons: addons_from_json(&model.selected_addons),
            id: model.id,
            cart_id: model.cart_id,
            food_id: model.food_id,
            quantity: model.quantity,
            price_snapshot: model.price_snapshot,
            selected_variant: model.selected_variant,
            notes: model.notes,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<saved_cart_items::Model> for SavedCartItem {
    fn from(model: saved_cart_items::Model) -> Self {
        Self {
            selected_addons: addons_from_json(&model.selected_addons),
            id: model.id,
            food_id: model.food_id,
            quantity: model.quantity,
            price_snapshot: model.price_snapshot,
            selected_variant: model.selected_variant,
            notes: model.notes,
        }
    }
}

impl SavedCart {
    pub fn from_parts(cart: saved_carts::Model, items: Vec<saved_cart_items::Model>) -> Self {
        Self {
            id: cart.id,
            name: cart.name,
            items: items.into_iter().map(Into::into).collect(),
            created_at: cart.created_at.with_timezone(&Utc),
            updated_at: cart.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            can_be_cancelled: model.can_be_cancelled(),
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            delivery_address: model.delivery_address,
            phone_number: model.phone_number,
            delivery_notes: model.delivery_notes,
            status: model.status,
            payment_status: model.payment_status,
            payment_reference: model.payment_reference,
            payment_method: model.payment_method,
            total_amount: model.total_amount,
            paid_amount: model.paid_amount,
            items_count: model.items_count,
            is_paid: model.is_paid,
            admin_notes: model.admin_notes,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            shipped_at: model.shipped_at.map(|dt| dt.with_timezone(&Utc)),
            completed_at: model.completed_at.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            total_price: model.food_price * i64::from(model.quantity),
            selected_addons: addons_from_json(&model.selected_addons),
            id: model.id,
            order_id: model.order_id,
            food_id: model.food_id,
            food_name: model.food_name,
            food_price: model.food_price,
            quantity: model.quantity,
            selected_variant: model.selected_variant,
            notes: model.notes,
        }
    }
}

impl From<order_status_history::Model> for StatusHistoryEntry {
    fn from(model: order_status_history::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            old_status: model.old_status,
            new_status: model.new_status,
            changed_by: model.changed_by,
            notes: model.notes,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<payments::Model> for Payment {
    fn from(model: payments::Model) -> Self {
        Self {
            is_successful: model.status == PaymentStatus::Successful,
            id: model.id,
            reference: model.reference,
            order_id: model.order_id,
            user_id: model.user_id,
            amount: model.amount,
            currency: model.currency,
            status: model.status,
            authorization_url: model.authorization_url,
            failure_reason: model.failure_reason,
            created_at: model.created_at.with_timezone(&Utc),
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}
