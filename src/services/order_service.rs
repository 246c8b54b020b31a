use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutRequest, OrderList, OrderStats, OrderWithItems},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        foods::{Column as FoodCol, Entity as Foods},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    identifiers, ledger,
    middleware::auth::AuthUser,
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::cart_service,
    state::AppState,
    status::{OrderPaymentStatus, OrderStatus},
};

pub const PAYMENT_METHOD: &str = "paystack";

/// Turn the user's active cart into an order and empty the cart.
///
/// Runs entirely on `conn`; callers pass a transaction so the order, its
/// item snapshots and the emptied cart commit or roll back together.
pub async fn place_order<C, F>(
    conn: &C,
    user_id: Uuid,
    payload: &CheckoutRequest,
    order_number_candidate: F,
) -> AppResult<OrderModel>
where
    C: ConnectionTrait + TransactionTrait,
    F: FnMut() -> String,
{
    let cart = Carts::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user_id))
                .add(CartCol::IsActive.eq(true)),
        )
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(AppError::NoActiveCart)?;

    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .lock(LockType::Update)
        .all(conn)
        .await?;
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let (total_amount, total_items) = cart_service::cart_totals(&lines);
    let items_count = i32::try_from(total_items)
        .map_err(|_| AppError::BadRequest("Cart has too many items".into()))?;

    let food_names: HashMap<Uuid, String> = Foods::find()
        .filter(FoodCol::Id.is_in(lines.iter().map(|line| line.food_id)))
        .all(conn)
        .await?
        .into_iter()
        .map(|food| (food.id, food.name))
        .collect();

    let now = Utc::now();
    let delivery_address = payload.delivery_address.trim().to_string();
    let phone_number = payload.phone_number.trim().to_string();
    let delivery_notes = payload.notes.clone().filter(|n| !n.trim().is_empty());

    let build = |order_number: String| OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: Set(order_number),
        user_id: Set(user_id),
        delivery_address: Set(delivery_address.clone()),
        phone_number: Set(phone_number.clone()),
        delivery_notes: Set(delivery_notes.clone()),
        status: Set(OrderStatus::Pending),
        payment_status: Set(OrderPaymentStatus::Pending),
        payment_reference: Set(None),
        payment_method: Set(PAYMENT_METHOD.to_string()),
        total_amount: Set(total_amount),
        paid_amount: Set(0),
        items_count: Set(items_count),
        is_paid: Set(false),
        admin_notes: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        paid_at: Set(None),
        shipped_at: Set(None),
        completed_at: Set(None),
    };
    let order =
        identifiers::insert_unique(conn, "order number", order_number_candidate, build).await?;

    let snapshots = lines.iter().map(|line| OrderItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        food_id: Set(Some(line.food_id)),
        food_name: Set(food_names.get(&line.food_id).cloned().unwrap_or_default()),
        food_price: Set(line.price_snapshot),
        quantity: Set(line.quantity),
        selected_variant: Set(line.selected_variant.clone()),
        selected_addons: Set(line.selected_addons.clone()),
        notes: Set(line.notes.clone()),
        created_at: Set(now.into()),
    });
    OrderItems::insert_many(snapshots)
        .exec_without_returning(conn)
        .await?;

    // Only the lines that went into the snapshot; the cart itself stays active.
    CartItems::delete_many()
        .filter(CartItemCol::Id.is_in(lines.iter().map(|line| line.id)))
        .exec(conn)
        .await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total_amount,
        items_count,
        "order placed"
    );
    Ok(order)
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    payload.validate().map_err(AppError::Validation)?;

    let txn = state.orm.begin().await?;
    let order = place_order(
        &txn,
        user.user_id,
        &payload,
        identifiers::order_number_candidate,
    )
    .await?;
    txn.commit().await?;

    let details = load_order_details(&state.orm, order).await?;
    Ok(ApiResponse::single("Order created successfully!", details))
}

/// Move `order` to `new_status` and append the matching history entry.
///
/// The caller must hold the order row (locked, inside a transaction) so the
/// history entry and the status change commit together.
pub async fn update_status<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
    new_status: OrderStatus,
    note: Option<String>,
    actor: Option<Uuid>,
) -> AppResult<OrderModel> {
    let old_status = order.status;
    if !old_status.can_transition_to(new_status) {
        return Err(AppError::InvalidTransition {
            from: old_status,
            to: new_status,
        });
    }
    let note = note.filter(|n| !n.trim().is_empty());

    ledger::record_transition(conn, order.id, old_status, new_status, actor, note.clone())
        .await?;

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(new_status);
    match new_status {
        OrderStatus::Shipped => active.shipped_at = Set(Some(now.into())),
        OrderStatus::Completed => active.completed_at = Set(Some(now.into())),
        OrderStatus::Pending | OrderStatus::Cancelled => {}
    }
    if let Some(note) = note {
        active.admin_notes = Set(Some(note));
    }
    active.updated_at = Set(now.into());
    Ok(active.update(conn).await?)
}

/// Record a successful payment on the order. Delivery status is untouched.
pub async fn mark_as_paid<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
    payment_reference: &str,
) -> AppResult<OrderModel> {
    let now = Utc::now();
    let total_amount = order.total_amount;
    let mut active: OrderActive = order.into();
    active.payment_status = Set(OrderPaymentStatus::Paid);
    active.is_paid = Set(true);
    active.paid_amount = Set(total_amount);
    active.paid_at = Set(Some(now.into()));
    active.payment_reference = Set(Some(payment_reference.to_string()));
    active.updated_at = Set(now.into());
    let order = active.update(conn).await?;
    tracing::info!(order_id = %order.id, %payment_reference, "order marked as paid");
    Ok(order)
}

pub async fn find_order_for_update<C: ConnectionTrait>(
    conn: &C,
    condition: Condition,
) -> AppResult<OrderModel> {
    Orders::find()
        .filter(condition)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn cancel(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = find_order_for_update(
        &txn,
        Condition::all()
            .add(OrderCol::UserId.eq(user.user_id))
            .add(OrderCol::Id.eq(id)),
    )
    .await?;

    if !order.can_be_cancelled() {
        return Err(AppError::NotCancellable);
    }

    let order = update_status(
        &txn,
        order,
        OrderStatus::Cancelled,
        Some("Cancelled by customer".into()),
        Some(user.user_id),
    )
    .await?;
    txn.commit().await?;

    let details = load_order_details(&state.orm, order).await?;
    Ok(ApiResponse::single("Order cancelled successfully", details))
}

pub async fn load_order_details<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::FoodName)
        .all(conn)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let status_history = ledger::history_for(conn, order.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(OrderWithItems {
        order: order.into(),
        items,
        status_history,
    })
}

/// Paginated order listing; `owner` restricts it to one user's orders.
pub async fn query_orders(
    state: &AppState,
    owner: Option<Uuid>,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    if let Some(user_id) = owner {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders: Vec<Order> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    query_orders(state, Some(user.user_id), query).await
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let details = load_order_details(&state.orm, order).await?;
    Ok(ApiResponse::single("OK", details))
}

pub async fn order_stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderStats>> {
    let mine = Orders::find().filter(OrderCol::UserId.eq(user.user_id));
    let total_orders = mine.clone().count(&state.orm).await?;
    let pending_orders = mine
        .clone()
        .filter(OrderCol::Status.eq(OrderStatus::Pending))
        .count(&state.orm)
        .await?;
    let completed_orders = mine
        .filter(OrderCol::Status.eq(OrderStatus::Completed))
        .count(&state.orm)
        .await?;

    Ok(ApiResponse::single(
        "OK",
        OrderStats {
            total_orders,
            pending_orders,
            completed_orders,
        },
    ))
}
