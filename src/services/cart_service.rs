use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartView, UpdateCartItemRequest},
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
            Model as CartItemModel,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::addons_to_json,
    response::ApiResponse,
    services::catalog_service,
    state::AppState,
};

/// The user's active cart, if one has been created. Never creates one.
pub async fn active_cart_for<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Option<CartModel>> {
    let cart = Carts::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user_id))
                .add(CartCol::IsActive.eq(true)),
        )
        .one(conn)
        .await?;
    Ok(cart)
}

pub async fn create_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<CartModel> {
    let now = Utc::now();
    let cart = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await?;
    tracing::debug!(cart_id = %cart.id, %user_id, "created cart");
    Ok(cart)
}

pub async fn cart_lines<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> AppResult<Vec<CartItemModel>> {
    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_desc(CartItemCol::CreatedAt)
        .all(conn)
        .await?;
    Ok(lines)
}

/// `(subtotal, total_items)` over the snapshot prices.
pub fn cart_totals(lines: &[CartItemModel]) -> (i64, i64) {
    lines.iter().fold((0, 0), |(subtotal, count), line| {
        (subtotal + line.line_total(), count + i64::from(line.quantity))
    })
}

pub(crate) async fn build_view<C: ConnectionTrait>(
    conn: &C,
    cart: Option<&CartModel>,
) -> AppResult<CartView> {
    let Some(cart) = cart else {
        return Ok(CartView {
            id: None,
            items: Vec::new(),
            subtotal: 0,
            total_items: 0,
        });
    };
    let lines = cart_lines(conn, cart.id).await?;
    let (subtotal, total_items) = cart_totals(&lines);
    Ok(CartView {
        id: Some(cart.id),
        items: lines.into_iter().map(Into::into).collect(),
        subtotal,
        total_items,
    })
}

pub async fn view_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = active_cart_for(&state.orm, user.user_id).await?;
    let view = build_view(&state.orm, cart.as_ref()).await?;
    Ok(ApiResponse::single("OK", view))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    payload.validate().map_err(AppError::Validation)?;

    let txn = state.orm.begin().await?;
    let food = catalog_service::find_orderable_food(&txn, payload.food_id).await?;

    let cart = match active_cart_for(&txn, user.user_id).await? {
        Some(cart) => cart,
        None => create_cart(&txn, user.user_id).await?,
    };

    let existing = CartItems::find()
        .filter(
            Condition::all()
                .add(CartItemCol::CartId.eq(cart.id))
                .add(CartItemCol::FoodId.eq(food.id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let now = Utc::now();
    let message = match existing {
        Some(line) => {
            let quantity = line
                .quantity
                .checked_add(payload.quantity)
                .ok_or_else(|| AppError::BadRequest("quantity is too large".into()))?;
            let mut active: CartItemActive = line.into();
            active.quantity = Set(quantity);
            if let Some(variant) = payload.selected_variant.filter(|v| !v.is_empty()) {
                active.selected_variant = Set(Some(variant));
            }
            if let Some(addons) = payload.selected_addons.filter(|a| !a.is_empty()) {
                active.selected_addons = Set(addons_to_json(&addons));
            }
            if let Some(notes) = payload.notes.filter(|n| !n.is_empty()) {
                active.notes = Set(Some(notes));
            }
            active.updated_at = Set(now.into());
            active.update(&txn).await?;
            "Cart updated"
        }
        None => {
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                food_id: Set(food.id),
                quantity: Set(payload.quantity),
                price_snapshot: Set(food.current_price()),
                selected_variant: Set(payload.selected_variant),
                selected_addons: Set(addons_to_json(
                    &payload.selected_addons.unwrap_or_default(),
                )),
                notes: Set(payload.notes),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
            "Added to cart"
        }
    };

    txn.commit().await?;
    tracing::info!(user_id = %user.user_id, food_id = %food.id, "cart item added");

    let view = build_view(&state.orm, Some(&cart)).await?;
    Ok(ApiResponse::single(message, view))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    payload.validate().map_err(AppError::Validation)?;

    let txn = state.orm.begin().await?;
    let cart = active_cart_for(&txn, user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let line = CartItems::find()
        .filter(
            Condition::all()
                .add(CartItemCol::Id.eq(item_id))
                .add(CartItemCol::CartId.eq(cart.id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: CartItemActive = line.into();
    if let Some(quantity) = payload.quantity {
        active.quantity = Set(quantity);
    }
    if let Some(variant) = payload.selected_variant {
        active.selected_variant = Set(Some(variant));
    }
    if let Some(addons) = payload.selected_addons {
        active.selected_addons = Set(addons_to_json(&addons));
    }
    if let Some(notes) = payload.notes {
        active.notes = Set(Some(notes));
    }
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;
    txn.commit().await?;

    let view = build_view(&state.orm, Some(&cart)).await?;
    Ok(ApiResponse::single("Cart item updated", view))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let cart = active_cart_for(&state.orm, user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let result = CartItems::delete_many()
        .filter(
            Condition::all()
                .add(CartItemCol::Id.eq(item_id))
                .add(CartItemCol::CartId.eq(cart.id)),
        )
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    let view = build_view(&state.orm, Some(&cart)).await?;
    Ok(ApiResponse::single("Removed from cart", view))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let Some(cart) = active_cart_for(&state.orm, user.user_id).await? else {
        let view = build_view(&state.orm, None).await?;
        return Ok(ApiResponse::single("Cart cleared (0 items removed)", view));
    };

    let result = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&state.orm)
        .await?;

    let view = build_view(&state.orm, Some(&cart)).await?;
    Ok(ApiResponse::single(
        format!("Cart cleared ({} items removed)", result.rows_affected),
        view,
    ))
}
