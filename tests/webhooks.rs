mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use common::*;
use food_order_api::{
    dto::payments::{InitializePaymentRequest, VerifyPaymentRequest, WebhookOutcome},
    error::AppError,
    gateway::signature::SIGNATURE_HEADER,
    middleware::auth::AuthUser,
    routes::create_api_router,
    services::payment_service,
    state::AppState,
    status::{OrderPaymentStatus, OrderStatus, PaymentStatus},
};
use tower::ServiceExt;

struct Fixture {
    state: AppState,
    gateway: std::sync::Arc<FakeGateway>,
    user: AuthUser,
    order_id: uuid::Uuid,
    reference: String,
}

async fn pending_payment() -> anyhow::Result<Fixture> {
    let (state, gateway) = setup().await?;
    let user = create_user(&state, "user").await?;
    let placed = order_of_2200(&state, &user).await?;
    let link = payment_service::initiate(
        &state,
        &user,
        InitializePaymentRequest {
            order_id: placed.order.id,
        },
    )
    .await?
    .data
    .expect("payment link");
    Ok(Fixture {
        state,
        gateway,
        user,
        order_id: placed.order.id,
        reference: link.reference,
    })
}

async fn deliver(state: &AppState, body: &[u8]) -> Result<WebhookOutcome, AppError> {
    let signature = sign(body);
    payment_service::handle_webhook(state, body, Some(&signature)).await
}

#[tokio::test]
async fn unsigned_or_forged_deliveries_change_nothing() -> anyhow::Result<()> {
    let fx = pending_payment().await?;
    let body = webhook_body("charge.success", &fx.reference, 2200);

    let err = payment_service::handle_webhook(&fx.state, &body, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    let forged = food_order_api::gateway::signature::sign(&body, "not-the-secret").expect("hmac key");
    let err = payment_service::handle_webhook(&fx.state, &body, Some(&forged))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    // Signature over a different body.
    let other = webhook_body("charge.success", &fx.reference, 999_999);
    let err = payment_service::handle_webhook(&fx.state, &body, Some(&sign(&other)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    assert_eq!(
        reload_payment(&fx.state, &fx.reference).await?.status,
        PaymentStatus::Pending
    );
    assert!(!reload_order(&fx.state, fx.order_id).await?.is_paid);
    assert!(history(&fx.state, fx.order_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_references_and_events_are_acknowledged() -> anyhow::Result<()> {
    let fx = pending_payment().await?;

    let body = webhook_body("charge.success", "PAY_DOES_NOT_EXIST", 2200);
    assert_eq!(
        deliver(&fx.state, &body).await?,
        WebhookOutcome::PaymentNotFound
    );

    let body = br#"{"event":"transfer.success","data":{"reference":"TRF_1"}}"#;
    assert_eq!(deliver(&fx.state, body).await?, WebhookOutcome::Ignored);

    let err = deliver(&fx.state, b"not json").await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assert_eq!(
        reload_payment(&fx.state, &fx.reference).await?.status,
        PaymentStatus::Pending
    );
    Ok(())
}

#[tokio::test]
async fn charge_success_pays_order_once() -> anyhow::Result<()> {
    let fx = pending_payment().await?;
    let body = webhook_body("charge.success", &fx.reference, 2200);

    assert_eq!(
        deliver(&fx.state, &body).await?,
        WebhookOutcome::PaymentConfirmed
    );
    assert_eq!(
        deliver(&fx.state, &body).await?,
        WebhookOutcome::AlreadyProcessed
    );

    let order = reload_order(&fx.state, fx.order_id).await?;
    assert!(order.is_paid);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
    assert_eq!(payment_events(&fx.state, fx.order_id).await?, 1);

    let note = history(&fx.state, fx.order_id).await?[0]
        .notes
        .clone()
        .unwrap_or_default();
    assert!(note.contains("webhook") && note.contains("22.00 NGN"));

    // The customer's verify afterwards is served from the stored result.
    let resp = payment_service::verify(
        &fx.state,
        &fx.user,
        VerifyPaymentRequest {
            reference: fx.reference.clone(),
        },
    )
    .await?;
    assert_eq!(resp.message, "Payment already verified");
    assert_eq!(fx.gateway.verify_count(), 0);
    Ok(())
}

#[tokio::test]
async fn concurrent_duplicate_deliveries_apply_once() -> anyhow::Result<()> {
    let fx = pending_payment().await?;
    let body = webhook_body("charge.success", &fx.reference, 2200);

    let (a, b) = tokio::join!(deliver(&fx.state, &body), deliver(&fx.state, &body));
    let mut outcomes = vec![a?, b?];
    outcomes.sort_by_key(|o| format!("{o:?}"));
    assert_eq!(
        outcomes,
        vec![
            WebhookOutcome::AlreadyProcessed,
            WebhookOutcome::PaymentConfirmed
        ]
    );

    assert_eq!(payment_events(&fx.state, fx.order_id).await?, 1);
    let order = reload_order(&fx.state, fx.order_id).await?;
    assert!(order.is_paid);
    assert_eq!(order.paid_amount, 2200);
    Ok(())
}

#[tokio::test]
async fn verify_racing_webhook_records_one_event() -> anyhow::Result<()> {
    let fx = pending_payment().await?;
    fx.gateway.on_verify(Script::Success { amount: Some(2200) });
    let body = webhook_body("charge.success", &fx.reference, 2200);

    let (webhook, verify) = tokio::join!(
        deliver(&fx.state, &body),
        payment_service::verify(
            &fx.state,
            &fx.user,
            VerifyPaymentRequest {
                reference: fx.reference.clone(),
            },
        )
    );
    webhook?;
    let verify = verify?.data.expect("verify result");
    assert!(verify.payment.is_successful);
    assert!(verify.order.is_paid);

    assert_eq!(payment_events(&fx.state, fx.order_id).await?, 1);
    assert_eq!(
        reload_payment(&fx.state, &fx.reference).await?.status,
        PaymentStatus::Successful
    );
    Ok(())
}

#[tokio::test]
async fn charge_failed_records_failure_without_touching_delivery() -> anyhow::Result<()> {
    let fx = pending_payment().await?;
    let body = webhook_body("charge.failed", &fx.reference, 2200);

    assert_eq!(
        deliver(&fx.state, &body).await?,
        WebhookOutcome::FailureRecorded
    );
    assert_eq!(
        deliver(&fx.state, &body).await?,
        WebhookOutcome::AlreadyProcessed
    );

    let payment = reload_payment(&fx.state, &fx.reference).await?;
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.failure_reason.as_deref(), Some("Insufficient funds"));

    let order = reload_order(&fx.state, fx.order_id).await?;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, OrderPaymentStatus::Failed);
    assert_eq!(payment_events(&fx.state, fx.order_id).await?, 1);

    // A late success for a failed payment is logged but never applied.
    let success = webhook_body("charge.success", &fx.reference, 2200);
    assert_eq!(
        deliver(&fx.state, &success).await?,
        WebhookOutcome::AlreadyProcessed
    );
    assert_eq!(
        reload_payment(&fx.state, &fx.reference).await?.status,
        PaymentStatus::Failed
    );
    assert!(!reload_order(&fx.state, fx.order_id).await?.is_paid);
    assert_eq!(payment_events(&fx.state, fx.order_id).await?, 2);
    Ok(())
}

#[tokio::test]
async fn webhook_amount_mismatch_fails_payment() -> anyhow::Result<()> {
    let fx = pending_payment().await?;
    let body = webhook_body("charge.success", &fx.reference, 1000);

    assert_eq!(
        deliver(&fx.state, &body).await?,
        WebhookOutcome::AmountMismatch
    );
    let payment = reload_payment(&fx.state, &fx.reference).await?;
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(!reload_order(&fx.state, fx.order_id).await?.is_paid);
    Ok(())
}

#[tokio::test]
async fn abandoned_verification_keeps_payment_open_for_the_webhook() -> anyhow::Result<()> {
    let fx = pending_payment().await?;

    // Customer lands on the verify page before finishing checkout.
    fx.gateway.on_verify(Script::Abandoned);
    let resp = payment_service::verify(
        &fx.state,
        &fx.user,
        VerifyPaymentRequest {
            reference: fx.reference.clone(),
        },
    )
    .await?;
    assert_eq!(resp.message, "Payment is abandoned");
    assert_eq!(
        reload_payment(&fx.state, &fx.reference).await?.status,
        PaymentStatus::Pending
    );
    assert_eq!(
        reload_order(&fx.state, fx.order_id).await?.payment_status,
        OrderPaymentStatus::Pending
    );

    // Then pays; the provider's success must still land.
    let body = webhook_body("charge.success", &fx.reference, 2200);
    assert_eq!(
        deliver(&fx.state, &body).await?,
        WebhookOutcome::PaymentConfirmed
    );
    let order = reload_order(&fx.state, fx.order_id).await?;
    assert!(order.is_paid);
    assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
    assert_eq!(
        reload_payment(&fx.state, &fx.reference).await?.status,
        PaymentStatus::Successful
    );
    assert_eq!(payment_events(&fx.state, fx.order_id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn kobo_amounts_are_settled_exactly() -> anyhow::Result<()> {
    let (state, _) = setup().await?;
    let user = create_user(&state, "user").await?;
    // ₦1,250.50
    let chapman = create_food(&state, "Chapman", 125_050).await?;
    add_to_cart(&state, &user, &chapman, 2).await?;
    let placed = checkout(&state, &user).await?;
    assert_eq!(placed.order.total_amount, 250_100);
    assert_eq!(placed.items[0].food_price, 125_050);

    let initiate = |order_id| {
        payment_service::initiate(&state, &user, InitializePaymentRequest { order_id })
    };

    // One kobo short is still short.
    let short = initiate(placed.order.id).await?.data.expect("payment link");
    assert_eq!(short.amount, 250_100);
    let body = webhook_body("charge.success", &short.reference, 250_099);
    assert_eq!(
        deliver(&state, &body).await?,
        WebhookOutcome::AmountMismatch
    );
    assert!(!reload_order(&state, placed.order.id).await?.is_paid);

    let full = initiate(placed.order.id).await?.data.expect("payment link");
    let body = webhook_body("charge.success", &full.reference, 250_100);
    assert_eq!(
        deliver(&state, &body).await?,
        WebhookOutcome::PaymentConfirmed
    );
    let order = reload_order(&state, placed.order.id).await?;
    assert!(order.is_paid);
    assert_eq!(order.paid_amount, 250_100);

    let notes: Vec<String> = history(&state, placed.order.id)
        .await?
        .into_iter()
        .filter_map(|entry| entry.notes)
        .collect();
    assert!(notes.iter().any(|n| n.contains("expected 2501.00 NGN, reported 2500.99")));
    assert!(notes.iter().any(|n| n.contains("Amount: 2501.00 NGN")));
    Ok(())
}

#[tokio::test]
async fn webhook_route_reads_signature_header() -> anyhow::Result<()> {
    let fx = pending_payment().await?;
    let app: Router = Router::new()
        .nest("/api", create_api_router())
        .with_state(fx.state.clone());
    let body = webhook_body("charge.success", &fx.reference, 2200);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/payments/webhook")
                .header("content-type", "application/json")
                .header(SIGNATURE_HEADER, "deadbeef")
                .body(Body::from(body.clone()))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::post("/api/payments/webhook")
                .header("content-type", "application/json")
                .header(SIGNATURE_HEADER, sign(&body))
                .body(Body::from(body))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let json: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(json["data"]["outcome"], "payment_confirmed");
    assert_eq!(json["message"], "Payment processed successfully");
    assert!(reload_order(&fx.state, fx.order_id).await?.is_paid);
    Ok(())
}
