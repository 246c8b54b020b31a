//! Read-only lookups into the menu the cart prices against.

use sea_orm::{ConnectionTrait, EntityTrait};
use uuid::Uuid;

use crate::{
    entity::foods::{Entity as Foods, Model as FoodModel},
    error::{AppError, AppResult},
};

/// Fetch a food that can currently be added to a cart.
pub async fn find_orderable_food<C: ConnectionTrait>(
    conn: &C,
    food_id: Uuid,
) -> AppResult<FoodModel> {
    let food = Foods::find_by_id(food_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::BadRequest("food not found".to_string()))?;
    if !food.is_available {
        return Err(AppError::BadRequest(format!(
            "{} is currently unavailable",
            food.name
        )));
    }
    Ok(food)
}
