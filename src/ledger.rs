//! Append-only order timeline.
//!
//! Every status transition is written here in the same transaction as the
//! status change itself. Payment events that leave the status untouched are
//! recorded with [`record_event`] so they show up on the same timeline
//! without pretending to be a transition.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    entity::order_status_history::{
        ActiveModel as HistoryActive, Column as HistoryCol, Entity as History,
        Model as HistoryModel,
    },
    error::AppResult,
    status::{HistoryKind, OrderStatus},
};

async fn append<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    kind: HistoryKind,
    old_status: OrderStatus,
    new_status: OrderStatus,
    changed_by: Option<Uuid>,
    notes: Option<String>,
) -> AppResult<HistoryModel> {
    let entry = HistoryActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        kind: Set(kind),
        old_status: Set(old_status),
        new_status: Set(new_status),
        changed_by: Set(changed_by),
        notes: Set(notes),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await?;
    Ok(entry)
}

/// Record a status change. `changed_by` is `None` for system actors.
pub async fn record_transition<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    old_status: OrderStatus,
    new_status: OrderStatus,
    changed_by: Option<Uuid>,
    notes: Option<String>,
) -> AppResult<HistoryModel> {
    tracing::info!(%order_id, from = %old_status, to = %new_status, "order status transition");
    append(
        conn,
        order_id,
        HistoryKind::StatusChange,
        old_status,
        new_status,
        changed_by,
        notes,
    )
    .await
}

/// Record a payment event against the order's current status without
/// transitioning it.
pub async fn record_event<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    current_status: OrderStatus,
    changed_by: Option<Uuid>,
    notes: impl Into<String>,
) -> AppResult<HistoryModel> {
    let notes = notes.into();
    tracing::info!(%order_id, status = %current_status, event = %notes, "order payment event");
    append(
        conn,
        order_id,
        HistoryKind::PaymentEvent,
        current_status,
        current_status,
        changed_by,
        Some(notes),
    )
    .await
}

/// Timeline for one order, oldest first.
pub async fn history_for<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<HistoryModel>> {
    let entries = History::find()
        .filter(HistoryCol::OrderId.eq(order_id))
        .order_by_asc(HistoryCol::CreatedAt)
        .all(conn)
        .await?;
    Ok(entries)
}
