use std::time::Duration;

use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use food_order_api::{
    config::GatewayConfig,
    gateway::{GatewayError, InitializeRequest, PaymentGateway, PaystackClient},
};
use serde_json::{Value, json};

const SECRET: &str = "sk_test_stub";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {SECRET}"))
}

async fn initialize(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": false, "message": "Invalid key" })),
        );
    }
    let reference = body["reference"].as_str().unwrap_or_default().to_string();
    (
        StatusCode::OK,
        Json(json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": format!("https://checkout.paystack.test/{reference}"),
                "access_code": format!("ac_{}", body["amount"]),
                "reference": reference,
            }
        })),
    )
}

async fn verify(Path(reference): Path<String>) -> (StatusCode, Json<Value>) {
    match reference.as_str() {
        "SLOW" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            (StatusCode::OK, Json(json!({ "status": true, "data": {} })))
        }
        "MISSING" => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": false, "message": "Transaction reference not found" })),
        ),
        "ABANDONED" => (
            StatusCode::OK,
            Json(json!({
                "status": true,
                "message": "Verification successful",
                "data": { "status": "abandoned", "amount": 220000, "gateway_response": "The transaction was not completed" }
            })),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "status": true,
                "message": "Verification successful",
                "data": { "status": "success", "amount": 220050, "gateway_response": "Approved" }
            })),
        ),
    }
}

async fn client_for_stub(secret: &str) -> anyhow::Result<PaystackClient> {
    let app = Router::new()
        .route("/transaction/initialize", post(initialize))
        .route("/transaction/verify/{reference}", get(verify));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let config = GatewayConfig {
        base_url: format!("http://{addr}/"),
        secret_key: secret.to_string(),
        webhook_secret: secret.to_string(),
        timeout_seconds: 1,
        currency: "NGN".into(),
    };
    Ok(PaystackClient::new(&config)?)
}

fn request(reference: &str) -> InitializeRequest {
    InitializeRequest {
        email: "user@example.com".into(),
        amount: 220_050,
        reference: reference.into(),
        callback_url: Some(format!("http://localhost:5173/payment/verify/{reference}/")),
    }
}

#[tokio::test]
async fn initialize_sends_kobo_amount_and_returns_link() -> anyhow::Result<()> {
    let client = client_for_stub(SECRET).await?;
    let auth = client.initialize(request("PAY12345678ABCDEF")).await?;
    assert_eq!(
        auth.authorization_url,
        "https://checkout.paystack.test/PAY12345678ABCDEF"
    );
    assert_eq!(auth.access_code, "ac_220050");
    assert_eq!(auth.reference, "PAY12345678ABCDEF");
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_surface_provider_message() -> anyhow::Result<()> {
    let client = client_for_stub("sk_wrong").await?;
    let err = client
        .initialize(request("PAY12345678ABCDEF"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Rejected(ref msg) if msg == "Invalid key"));
    Ok(())
}

#[tokio::test]
async fn verify_maps_status_and_passes_amount_through() -> anyhow::Result<()> {
    let client = client_for_stub(SECRET).await?;

    let paid = client.verify("PAY12345678ABCDEF").await?;
    assert!(paid.success);
    assert_eq!(paid.amount, Some(220_050));
    assert_eq!(paid.message, "Approved");

    // Abandoned means the checkout page is still open, not a decline.
    let abandoned = client.verify("ABANDONED").await?;
    assert!(!abandoned.success);
    assert!(!abandoned.is_declined());
    assert_eq!(abandoned.raw_status, "abandoned");

    let err = client.verify("MISSING").await.unwrap_err();
    assert!(matches!(err, GatewayError::Rejected(ref msg) if msg == "Transaction reference not found"));
    Ok(())
}

#[tokio::test]
async fn slow_provider_times_out() -> anyhow::Result<()> {
    let client = client_for_stub(SECRET).await?;
    let err = client.verify("SLOW").await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout));
    Ok(())
}
