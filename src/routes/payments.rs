use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{
        InitializePaymentRequest, PaymentLink, PaymentList, PaymentStatusCheck,
        VerifyPaymentRequest, VerifyPaymentResult, WebhookAck,
    },
    error::AppResult,
    gateway::signature::SIGNATURE_HEADER,
    middleware::auth::AuthUser,
    models::Payment,
    response::ApiResponse,
    routes::params::Pagination,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/initialize", post(initialize_payment))
        .route("/verify", post(verify_payment))
        .route("/webhook", post(payment_webhook))
        .route("/check/{reference}", get(check_payment_status))
        .route("/{payment_id}", get(get_payment))
}

#[utoipa::path(
    post,
    path = "/api/payments/initialize",
    request_body = InitializePaymentRequest,
    responses(
        (status = 200, description = "Payment link created", body = ApiResponse<PaymentLink>),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already paid or cancelled"),
        (status = 502, description = "Payment provider rejected the request"),
        (status = 504, description = "Payment provider timed out"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initialize_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitializePaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentLink>>> {
    let resp = payment_service::initiate(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified, already verified, or still pending", body = ApiResponse<VerifyPaymentResult>),
        (status = 400, description = "Payment declined"),
        (status = 404, description = "Payment not found"),
        (status = 504, description = "Payment provider timed out"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<ApiResponse<VerifyPaymentResult>>> {
    let resp = payment_service::verify(&state, &user, payload).await?;
    Ok(Json(resp))
}

/// Provider callback. Unauthenticated; trust comes from the body signature.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body(content = String, description = "Raw event body signed with HMAC-SHA512"),
    responses(
        (status = 200, description = "Event acknowledged", body = ApiResponse<WebhookAck>),
        (status = 400, description = "Invalid signature or malformed body"),
    ),
    security(()),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<WebhookAck>>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = payment_service::handle_webhook(&state, &body, signature).await?;
    Ok(Json(ApiResponse::single(
        outcome.message(),
        WebhookAck { outcome },
    )))
}

#[utoipa::path(
    get,
    path = "/api/payments",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Payments of the current user", body = ApiResponse<PaymentList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = payment_service::list_payments(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/check/{reference}",
    params(
        ("reference" = String, Path, description = "Payment reference")
    ),
    responses(
        (status = 200, description = "Stored status of the payment", body = ApiResponse<PaymentStatusCheck>),
        (status = 404, description = "Payment not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn check_payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> AppResult<Json<ApiResponse<PaymentStatusCheck>>> {
    let resp = payment_service::check_status(&state, &user, &reference).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/{payment_id}",
    params(
        ("payment_id" = Uuid, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment detail", body = ApiResponse<Payment>),
        (status = 404, description = "Payment not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::get_payment(&state, &user, payment_id).await?;
    Ok(Json(resp))
}
