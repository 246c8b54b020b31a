use sea_orm::{ColumnTrait, Condition, EntityTrait, TransactionTrait};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    order_service::query_orders(state, None, query).await
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let details = order_service::load_order_details(&state.orm, order).await?;
    Ok(ApiResponse::single("Order found", details))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let order =
        order_service::find_order_for_update(&txn, Condition::all().add(OrderCol::Id.eq(id)))
            .await?;
    let order = order_service::update_status(
        &txn,
        order,
        payload.status,
        payload.admin_notes,
        Some(user.user_id),
    )
    .await?;
    txn.commit().await?;

    let details = order_service::load_order_details(&state.orm, order).await?;
    Ok(ApiResponse::single(
        format!("Order status updated to {}", details.order.status),
        details,
    ))
}
