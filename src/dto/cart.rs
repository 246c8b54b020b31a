use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::FieldError,
    models::{CartItem, SavedCart},
};

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub food_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub selected_variant: Option<String>,
    pub selected_addons: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl AddToCartRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        if self.quantity < 1 {
            return Err(vec![FieldError::new(
                "quantity",
                "quantity must be at least 1",
            )]);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: Option<i32>,
    pub selected_variant: Option<String>,
    pub selected_addons: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl UpdateCartItemRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        match self.quantity {
            Some(q) if q < 1 => Err(vec![FieldError::new(
                "quantity",
                "quantity must be at least 1",
            )]),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    /// `None` until the first item is added.
    pub id: Option<Uuid>,
    pub items: Vec<CartItem>,
    pub subtotal: i64,
    pub total_items: i64,
}

pub const DEFAULT_SAVED_CART_NAME: &str = "My Saved Cart";
const SAVED_CART_NAME_MAX: usize = 200;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SaveCartRequest {
    pub name: Option<String>,
}

impl SaveCartRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        match &self.name {
            Some(name) if name.trim().chars().count() > SAVED_CART_NAME_MAX => {
                Err(vec![FieldError::new(
                    "name",
                    format!("name must be at most {SAVED_CART_NAME_MAX} characters"),
                )])
            }
            _ => Ok(()),
        }
    }

    /// Trimmed name, falling back to the default when absent or blank.
    pub fn name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_SAVED_CART_NAME)
            .to_string()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SavedCartList {
    pub items: Vec<SavedCart>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoadedCart {
    pub cart: CartView,
    /// Lines copied into the active cart; unavailable or deleted foods are skipped.
    pub items_added: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_saved_cart_name_falls_back_to_default() {
        assert_eq!(SaveCartRequest { name: None }.name(), DEFAULT_SAVED_CART_NAME);
        let blank = SaveCartRequest {
            name: Some("   ".into()),
        };
        assert_eq!(blank.name(), DEFAULT_SAVED_CART_NAME);
        let named = SaveCartRequest {
            name: Some(" Friday lunch ".into()),
        };
        assert_eq!(named.name(), "Friday lunch");
    }

    #[test]
    fn overlong_saved_cart_name_is_rejected() {
        let request = SaveCartRequest {
            name: Some("x".repeat(201)),
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(errors[0].field, "name");
        assert!(SaveCartRequest::default().validate().is_ok());
    }
}
