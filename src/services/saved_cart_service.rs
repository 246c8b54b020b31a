//! Saved carts: named copies of the active cart that can be loaded back.
//!
//! Saving copies the lines, so later edits to the active cart never touch a
//! saved one. Loading replaces the active cart's lines and re-prices them
//! from the menu, skipping foods that are gone or unavailable.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::cart::{LoadedCart, SaveCartRequest, SavedCartList},
    entity::{
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems},
        foods::{Column as FoodCol, Entity as Foods},
        saved_cart_items::{
            ActiveModel as SavedItemActive, Column as SavedItemCol, Entity as SavedCartItems,
            Model as SavedItemModel,
        },
        saved_carts::{
            ActiveModel as SavedCartActive, Column as SavedCartCol, Entity as SavedCarts,
            Model as SavedCartModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::SavedCart,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    saved_cart_id: Uuid,
) -> AppResult<SavedCartModel> {
    SavedCarts::find()
        .filter(
            Condition::all()
                .add(SavedCartCol::Id.eq(saved_cart_id))
                .add(SavedCartCol::UserId.eq(user_id)),
        )
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn items_of<C: ConnectionTrait>(
    conn: &C,
    saved_cart_id: Uuid,
) -> AppResult<Vec<SavedItemModel>> {
    let items = SavedCartItems::find()
        .filter(SavedItemCol::SavedCartId.eq(saved_cart_id))
        .order_by_asc(SavedItemCol::CreatedAt)
        .all(conn)
        .await?;
    Ok(items)
}

pub async fn save_cart(
    state: &AppState,
    user: &AuthUser,
    payload: SaveCartRequest,
) -> AppResult<ApiResponse<SavedCart>> {
    payload.validate().map_err(AppError::Validation)?;

    let txn = state.orm.begin().await?;
    let cart = cart_service::active_cart_for(&txn, user.user_id)
        .await?
        .ok_or(AppError::NoActiveCart)?;
    let lines = cart_service::cart_lines(&txn, cart.id).await?;
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let now = Utc::now();
    let saved = SavedCartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        name: Set(payload.name()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let copies = lines.iter().map(|line| SavedItemActive {
        id: Set(Uuid::new_v4()),
        saved_cart_id: Set(saved.id),
        food_id: Set(Some(line.food_id)),
        quantity: Set(line.quantity),
        price_snapshot: Set(line.price_snapshot),
        selected_variant: Set(line.selected_variant.clone()),
        selected_addons: Set(line.selected_addons.clone()),
        notes: Set(line.notes.clone()),
        created_at: Set(now.into()),
    });
    SavedCartItems::insert_many(copies)
        .exec_without_returning(&txn)
        .await?;

    let items = items_of(&txn, saved.id).await?;
    txn.commit().await?;

    tracing::info!(user_id = %user.user_id, saved_cart_id = %saved.id, lines = items.len(), "cart saved");
    Ok(ApiResponse::single(
        "Cart saved successfully",
        SavedCart::from_parts(saved, items),
    ))
}

pub async fn list_saved_carts(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SavedCartList>> {
    let carts = SavedCarts::find()
        .filter(SavedCartCol::UserId.eq(user.user_id))
        .order_by_desc(SavedCartCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut items_by_cart: HashMap<Uuid, Vec<SavedItemModel>> = HashMap::new();
    if !carts.is_empty() {
        let items = SavedCartItems::find()
            .filter(SavedItemCol::SavedCartId.is_in(carts.iter().map(|c| c.id)))
            .order_by_asc(SavedItemCol::CreatedAt)
            .all(&state.orm)
            .await?;
        for item in items {
            items_by_cart.entry(item.saved_cart_id).or_default().push(item);
        }
    }

    let items = carts
        .into_iter()
        .map(|cart| {
            let lines = items_by_cart.remove(&cart.id).unwrap_or_default();
            SavedCart::from_parts(cart, lines)
        })
        .collect();
    Ok(ApiResponse::single("OK", SavedCartList { items }))
}

pub async fn get_saved_cart(
    state: &AppState,
    user: &AuthUser,
    saved_cart_id: Uuid,
) -> AppResult<ApiResponse<SavedCart>> {
    let cart = find_owned(&state.orm, user.user_id, saved_cart_id).await?;
    let items = items_of(&state.orm, cart.id).await?;
    Ok(ApiResponse::single("OK", SavedCart::from_parts(cart, items)))
}

pub async fn delete_saved_cart(
    state: &AppState,
    user: &AuthUser,
    saved_cart_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let cart = find_owned(&txn, user.user_id, saved_cart_id).await?;
    SavedCartItems::delete_many()
        .filter(SavedItemCol::SavedCartId.eq(cart.id))
        .exec(&txn)
        .await?;
    SavedCarts::delete_by_id(cart.id).exec(&txn).await?;
    txn.commit().await?;

    Ok(ApiResponse::single(
        "Saved cart deleted successfully",
        serde_json::json!({ "id": saved_cart_id }),
    ))
}

/// Replace the active cart's lines with the saved ones, priced as of now.
pub async fn load_saved_cart(
    state: &AppState,
    user: &AuthUser,
    saved_cart_id: Uuid,
) -> AppResult<ApiResponse<LoadedCart>> {
    let txn = state.orm.begin().await?;
    let saved = find_owned(&txn, user.user_id, saved_cart_id).await?;
    let saved_items = items_of(&txn, saved.id).await?;

    let cart = match cart_service::active_cart_for(&txn, user.user_id).await? {
        Some(cart) => cart,
        None => cart_service::create_cart(&txn, user.user_id).await?,
    };
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    let food_ids: HashSet<Uuid> = saved_items.iter().filter_map(|i| i.food_id).collect();
    let prices: HashMap<Uuid, i64> = if food_ids.is_empty() {
        HashMap::new()
    } else {
        Foods::find()
            .filter(
                Condition::all()
                    .add(FoodCol::Id.is_in(food_ids))
                    .add(FoodCol::IsAvailable.eq(true)),
            )
            .all(&txn)
            .await?
            .into_iter()
            .map(|food| (food.id, food.current_price()))
            .collect()
    };

    let now = Utc::now();
    let lines: Vec<CartItemActive> = saved_items
        .into_iter()
        .filter_map(|item| {
            let food_id = item.food_id?;
            let price = *prices.get(&food_id)?;
            Some(CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                food_id: Set(food_id),
                quantity: Set(item.quantity),
                price_snapshot: Set(price),
                selected_variant: Set(item.selected_variant),
                selected_addons: Set(item.selected_addons),
                notes: Set(item.notes),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            })
        })
        .collect();
    let items_added = lines.len() as i64;
    if !lines.is_empty() {
        CartItems::insert_many(lines)
            .exec_without_returning(&txn)
            .await?;
    }
    txn.commit().await?;

    tracing::info!(
        user_id = %user.user_id,
        saved_cart_id = %saved.id,
        items_added,
        "saved cart loaded"
    );
    let view = cart_service::build_view(&state.orm, Some(&cart)).await?;
    Ok(ApiResponse::single(
        format!("Saved cart \"{}\" loaded successfully", saved.name),
        LoadedCart {
            cart: view,
            items_added,
        },
    ))
}
