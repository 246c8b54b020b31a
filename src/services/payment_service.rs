//! Payment reconciler.
//!
//! A payment can be confirmed by the customer's verify call and by the
//! provider's webhook, in any order and any number of times. Every state
//! change happens with the payment row locked (payment first, then its
//! order), and a payment that is already terminal is never changed again,
//! so whichever confirmation arrives first wins and the rest are no-ops.

use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::payments::{
        InitializePaymentRequest, OrderPaymentSummary, PaymentLink, PaymentList,
        PaymentStatusCheck, VerifyPaymentRequest, VerifyPaymentResult, WebhookOutcome,
    },
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
        users::Entity as Users,
    },
    error::{AppError, AppResult, FieldError},
    gateway::{self, InitializeRequest, WebhookData, WebhookEvent, signature},
    identifiers, ledger,
    middleware::auth::AuthUser,
    models::Payment,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::order_service,
    state::AppState,
    status::{OrderPaymentStatus, OrderStatus, PaymentStatus},
};

const AMOUNT_MISMATCH: &str = "amount mismatch";

enum Settlement {
    Confirmed {
        payment: PaymentModel,
        order: OrderModel,
    },
    AmountMismatch,
}

fn order_summary(order: &OrderModel) -> OrderPaymentSummary {
    OrderPaymentSummary {
        id: order.id,
        order_number: order.order_number.clone(),
        status: order.status,
        payment_status: order.payment_status,
        is_paid: order.is_paid,
    }
}

async fn lock_payment<C: ConnectionTrait>(
    conn: &C,
    reference: &str,
) -> AppResult<Option<PaymentModel>> {
    let payment = Payments::find()
        .filter(PaymentCol::Reference.eq(reference))
        .lock(LockType::Update)
        .one(conn)
        .await?;
    Ok(payment)
}

async fn lock_order_of<C: ConnectionTrait>(
    conn: &C,
    payment: &PaymentModel,
) -> AppResult<OrderModel> {
    order_service::find_order_for_update(conn, Condition::all().add(OrderCol::Id.eq(payment.order_id)))
        .await
}

async fn fail_payment<C: ConnectionTrait>(
    conn: &C,
    payment: PaymentModel,
    reason: impl Into<String>,
) -> AppResult<PaymentModel> {
    let mut active: PaymentActive = payment.into();
    active.status = Set(PaymentStatus::Failed);
    active.failure_reason = Set(Some(reason.into()));
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}

/// Mark a pending payment failed after the provider declined it. An unpaid
/// order follows it to `failed`; its delivery status never changes.
async fn record_decline<C: ConnectionTrait>(
    conn: &C,
    payment: PaymentModel,
    reason: String,
    actor: Option<Uuid>,
) -> AppResult<PaymentModel> {
    let order = lock_order_of(conn, &payment).await?;
    let reference = payment.reference.clone();
    let payment = fail_payment(conn, payment, reason.clone()).await?;

    let order_id = order.id;
    let current_status = order.status;
    if !order.is_paid {
        let mut active: OrderActive = order.into();
        active.payment_status = Set(OrderPaymentStatus::Failed);
        active.updated_at = Set(Utc::now().into());
        active.update(conn).await?;
    }
    ledger::record_event(
        conn,
        order_id,
        current_status,
        actor,
        format!("Payment {reference} failed: {reason}"),
    )
    .await?;
    tracing::warn!(%reference, %reason, "payment declined");
    Ok(payment)
}

/// Apply a provider-confirmed success to a pending payment the caller holds
/// locked. The reported amount must cover the payment in full.
async fn settle_success<C: ConnectionTrait>(
    conn: &C,
    payment: PaymentModel,
    reported_amount: Option<i64>,
    channel: &str,
) -> AppResult<Settlement> {
    let order = lock_order_of(conn, &payment).await?;
    let reference = payment.reference.clone();

    let amount = match reported_amount {
        Some(amount) if amount >= payment.amount => amount,
        _ => {
            let reported =
                reported_amount.map_or_else(|| "none".to_string(), gateway::format_amount);
            tracing::warn!(
                %reference,
                expected = payment.amount,
                %reported,
                %channel,
                "payment amount mismatch"
            );
            let expected = gateway::format_amount(payment.amount);
            let currency = payment.currency.clone();
            fail_payment(conn, payment, AMOUNT_MISMATCH).await?;
            ledger::record_event(
                conn,
                order.id,
                order.status,
                None,
                format!(
                    "Payment {reference} rejected via {channel}: amount mismatch \
                     (expected {expected} {currency}, reported {reported})"
                ),
            )
            .await?;
            return Ok(Settlement::AmountMismatch);
        }
    };

    let now = Utc::now();
    let amount = gateway::format_amount(amount);
    let currency = payment.currency.clone();
    let mut active: PaymentActive = payment.into();
    active.status = Set(PaymentStatus::Successful);
    active.failure_reason = Set(None);
    active.paid_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let payment = active.update(conn).await?;

    let order = if order.is_paid {
        // Another payment got there first; the order keeps that reference.
        tracing::warn!(
            %reference,
            order_id = %order.id,
            existing = ?order.payment_reference,
            "order already paid by another payment"
        );
        ledger::record_event(
            conn,
            order.id,
            order.status,
            None,
            format!(
                "Payment {reference} successful via {channel} but order was already paid. Amount: {amount} {currency}"
            ),
        )
        .await?;
        order
    } else {
        let order = order_service::mark_as_paid(conn, order, &reference).await?;
        ledger::record_event(
            conn,
            order.id,
            order.status,
            None,
            format!("Payment {reference} successful via {channel}. Amount: {amount} {currency}"),
        )
        .await?;
        order
    };

    tracing::info!(%reference, order_id = %order.id, %channel, "payment confirmed");
    Ok(Settlement::Confirmed { payment, order })
}

pub async fn initiate(
    state: &AppState,
    user: &AuthUser,
    payload: InitializePaymentRequest,
) -> AppResult<ApiResponse<PaymentLink>> {
    let txn = state.orm.begin().await?;
    let order = order_service::find_order_for_update(
        &txn,
        Condition::all()
            .add(OrderCol::UserId.eq(user.user_id))
            .add(OrderCol::Id.eq(payload.order_id)),
    )
    .await?;

    if order.is_paid {
        return Err(AppError::AlreadyPaid);
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::OrderCancelled);
    }

    let customer = Users::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let currency = state.config.gateway.currency.clone();
    let payment = identifiers::insert_unique(
        &txn,
        "payment reference",
        identifiers::payment_reference_candidate,
        |reference| PaymentActive {
            id: Set(Uuid::new_v4()),
            reference: Set(reference),
            order_id: Set(order.id),
            user_id: Set(user.user_id),
            amount: Set(order.total_amount),
            currency: Set(currency.clone()),
            status: Set(PaymentStatus::Pending),
            authorization_url: Set(None),
            access_code: Set(None),
            failure_reason: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            paid_at: Set(None),
        },
    )
    .await?;
    let reference = payment.reference.clone();
    txn.commit().await?;

    let callback_url = format!(
        "{}/payment/verify/{}/",
        state.config.frontend_url.trim_end_matches('/'),
        reference
    );
    let request = InitializeRequest {
        email: customer.email,
        amount: payment.amount,
        reference: reference.clone(),
        callback_url: Some(callback_url),
    };

    match state.gateway.initialize(request).await {
        Ok(authorization) => {
            let amount = payment.amount;
            let currency = payment.currency.clone();
            let mut active: PaymentActive = payment.into();
            active.authorization_url = Set(Some(authorization.authorization_url.clone()));
            active.access_code = Set(Some(authorization.access_code.clone()));
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?;

            tracing::info!(%reference, order_id = %order.id, amount, "payment initialized");
            Ok(ApiResponse::single(
                "Payment initialized successfully",
                PaymentLink {
                    payment_url: authorization.authorization_url,
                    access_code: authorization.access_code,
                    reference,
                    order_id: order.id,
                    order_number: order.order_number,
                    amount,
                    currency,
                },
            ))
        }
        Err(err) => {
            tracing::error!(%reference, error = %err, "payment initialization failed");
            fail_payment(&state.orm, payment, err.to_string()).await?;
            Err(err.into())
        }
    }
}

pub async fn verify(
    state: &AppState,
    user: &AuthUser,
    payload: VerifyPaymentRequest,
) -> AppResult<ApiResponse<VerifyPaymentResult>> {
    let reference = payload.reference.trim();
    if reference.is_empty() {
        return Err(AppError::Validation(vec![FieldError::new(
            "reference",
            "Payment reference is required.",
        )]));
    }

    let payment = Payments::find()
        .filter(
            Condition::all()
                .add(PaymentCol::Reference.eq(reference))
                .add(PaymentCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    match payment.status {
        PaymentStatus::Successful => return already_verified(state, payment).await,
        PaymentStatus::Failed => {
            return Err(AppError::PaymentDeclined(
                payment
                    .failure_reason
                    .unwrap_or_else(|| "Payment failed".to_string()),
            ));
        }
        PaymentStatus::Pending => {}
    }

    // No transaction is open across the provider call.
    let verification = state.gateway.verify(reference).await.map_err(|err| {
        tracing::warn!(%reference, error = %err, "payment verification unavailable");
        AppError::from(err)
    })?;

    let txn = state.orm.begin().await?;
    let payment = lock_payment(&txn, reference)
        .await?
        .ok_or(AppError::NotFound)?;

    match payment.status {
        PaymentStatus::Successful => {
            txn.commit().await?;
            return already_verified(state, payment).await;
        }
        PaymentStatus::Failed => {
            return Err(AppError::PaymentDeclined(
                payment
                    .failure_reason
                    .unwrap_or_else(|| "Payment failed".to_string()),
            ));
        }
        PaymentStatus::Pending => {}
    }

    if verification.success {
        let settlement =
            settle_success(&txn, payment, verification.amount, "verification").await?;
        txn.commit().await?;
        return match settlement {
            Settlement::Confirmed { payment, order } => Ok(ApiResponse::single(
                "Payment verified successfully",
                VerifyPaymentResult {
                    payment: payment.into(),
                    order: order_summary(&order),
                },
            )),
            Settlement::AmountMismatch => Err(AppError::PaymentDeclined(
                WebhookOutcome::AmountMismatch.message().to_string(),
            )),
        };
    }

    if verification.is_declined() {
        let reason = if verification.message.is_empty() {
            format!("Payment {}", verification.raw_status)
        } else {
            verification.message
        };
        record_decline(&txn, payment, reason.clone(), Some(user.user_id)).await?;
        txn.commit().await?;
        return Err(AppError::PaymentDeclined(reason));
    }

    // Still in flight at the provider; nothing to record yet.
    txn.commit().await?;
    let order = Orders::find_by_id(payment.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::single(
        format!("Payment is {}", verification.raw_status),
        VerifyPaymentResult {
            payment: payment.into(),
            order: order_summary(&order),
        },
    ))
}

async fn already_verified(
    state: &AppState,
    payment: PaymentModel,
) -> AppResult<ApiResponse<VerifyPaymentResult>> {
    let order = Orders::find_by_id(payment.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::single(
        "Payment already verified",
        VerifyPaymentResult {
            payment: payment.into(),
            order: order_summary(&order),
        },
    ))
}

/// Authenticate and apply one webhook delivery.
///
/// Only a bad signature or an unparseable body is an error; everything else
/// is acknowledged so the provider stops retrying.
pub async fn handle_webhook(
    state: &AppState,
    payload: &[u8],
    signature_header: Option<&str>,
) -> AppResult<WebhookOutcome> {
    let secret = &state.config.gateway.webhook_secret;
    let authentic = signature_header.is_some_and(|sig| signature::verify(payload, sig, secret));
    if !authentic {
        tracing::warn!("webhook rejected: invalid signature");
        return Err(AppError::InvalidSignature);
    }

    let event: WebhookEvent = serde_json::from_slice(payload)
        .map_err(|err| AppError::BadRequest(format!("Malformed webhook payload: {err}")))?;
    tracing::info!(event = %event.event, reference = ?event.data.reference, "webhook received");

    let outcome = match event.event.as_str() {
        gateway::CHARGE_SUCCESS => on_charge_success(state, &event.data).await?,
        gateway::CHARGE_FAILED => on_charge_failed(state, &event.data).await?,
        other => {
            tracing::debug!(event = %other, "webhook event ignored");
            WebhookOutcome::Ignored
        }
    };
    tracing::info!(event = %event.event, ?outcome, "webhook handled");
    Ok(outcome)
}

async fn on_charge_success(state: &AppState, data: &WebhookData) -> AppResult<WebhookOutcome> {
    let Some(reference) = data.reference.as_deref() else {
        tracing::warn!("charge.success without reference");
        return Ok(WebhookOutcome::PaymentNotFound);
    };

    let txn = state.orm.begin().await?;
    let Some(payment) = lock_payment(&txn, reference).await? else {
        tracing::warn!(%reference, "webhook for unknown payment");
        return Ok(WebhookOutcome::PaymentNotFound);
    };

    let outcome = match payment.status {
        PaymentStatus::Successful => {
            tracing::info!(%reference, "payment already confirmed");
            WebhookOutcome::AlreadyProcessed
        }
        PaymentStatus::Failed => {
            // Failed is terminal; keep a trace of the late success for support.
            let order = lock_order_of(&txn, &payment).await?;
            tracing::warn!(%reference, "success reported for a failed payment, not applied");
            ledger::record_event(
                &txn,
                order.id,
                order.status,
                None,
                format!("Payment {reference} reported successful after it had failed; not applied"),
            )
            .await?;
            WebhookOutcome::AlreadyProcessed
        }
        PaymentStatus::Pending => {
            match settle_success(&txn, payment, data.amount, "webhook").await? {
                Settlement::Confirmed { .. } => WebhookOutcome::PaymentConfirmed,
                Settlement::AmountMismatch => WebhookOutcome::AmountMismatch,
            }
        }
    };
    txn.commit().await?;
    Ok(outcome)
}

async fn on_charge_failed(state: &AppState, data: &WebhookData) -> AppResult<WebhookOutcome> {
    let Some(reference) = data.reference.as_deref() else {
        tracing::warn!("charge.failed without reference");
        return Ok(WebhookOutcome::PaymentNotFound);
    };

    let txn = state.orm.begin().await?;
    let Some(payment) = lock_payment(&txn, reference).await? else {
        tracing::warn!(%reference, "webhook for unknown payment");
        return Ok(WebhookOutcome::PaymentNotFound);
    };
    if payment.status.is_terminal() {
        return Ok(WebhookOutcome::AlreadyProcessed);
    }

    let reason = data
        .gateway_response
        .clone()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "Payment failed".to_string());
    record_decline(&txn, payment, reason, None).await?;
    txn.commit().await?;
    Ok(WebhookOutcome::FailureRecorded)
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PaymentList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Payments::find()
        .filter(PaymentCol::UserId.eq(user.user_id))
        .order_by_desc(PaymentCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        PaymentList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_payment(
    state: &AppState,
    user: &AuthUser,
    payment_id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    let payment = Payments::find()
        .filter(
            Condition::all()
                .add(PaymentCol::Id.eq(payment_id))
                .add(PaymentCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::single("OK", payment.into()))
}

pub async fn check_status(
    state: &AppState,
    user: &AuthUser,
    reference: &str,
) -> AppResult<ApiResponse<PaymentStatusCheck>> {
    let payment = Payments::find()
        .filter(
            Condition::all()
                .add(PaymentCol::Reference.eq(reference))
                .add(PaymentCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let order = Orders::find_by_id(payment.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::single(
        "OK",
        PaymentStatusCheck {
            reference: payment.reference,
            status: payment.status,
            is_successful: payment.status == PaymentStatus::Successful,
            order_id: order.id,
            order_number: order.order_number,
        },
    ))
}
