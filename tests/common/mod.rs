#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use food_order_api::{
    config::{AppConfig, GatewayConfig},
    db::run_migrations,
    dto::{cart::AddToCartRequest, orders::CheckoutRequest, orders::OrderWithItems},
    entity::{
        foods::{ActiveModel as FoodActive, Model as FoodModel},
        order_status_history::Model as HistoryModel,
        orders::{Entity as Orders, Model as OrderModel},
        payments::{Column as PaymentCol, Entity as Payments, Model as PaymentModel},
        users::ActiveModel as UserActive,
    },
    gateway::{
        Authorization, GatewayError, InitializeRequest, PaymentGateway, Verification, signature,
    },
    ledger,
    middleware::auth::AuthUser,
    services::{cart_service, order_service},
    state::AppState,
    status::HistoryKind,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectOptions, Database, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test";

/// What the fake provider answers next.
#[derive(Debug, Clone)]
pub enum Script {
    Success { amount: Option<i64> },
    Declined,
    Pending,
    /// Initialized but the customer has not finished the checkout page.
    Abandoned,
    Timeout,
    Rejected(String),
}

pub struct FakeGateway {
    initialize_script: Mutex<Script>,
    verify_script: Mutex<Script>,
    pub initialize_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            initialize_script: Mutex::new(Script::Success { amount: None }),
            verify_script: Mutex::new(Script::Pending),
            initialize_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeGateway {
    pub fn on_initialize(&self, script: Script) {
        *self.initialize_script.lock().unwrap() = script;
    }

    pub fn on_verify(&self, script: Script) {
        *self.verify_script.lock().unwrap() = script;
    }

    pub fn verify_count(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initialize(&self, request: InitializeRequest) -> Result<Authorization, GatewayError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.initialize_script.lock().unwrap().clone();
        match script {
            Script::Timeout => Err(GatewayError::Timeout),
            Script::Rejected(message) => Err(GatewayError::Rejected(message)),
            _ => Ok(Authorization {
                authorization_url: format!("https://checkout.test/{}", request.reference),
                access_code: format!("ac_{}", request.reference),
                reference: request.reference,
            }),
        }
    }

    async fn verify(&self, _reference: &str) -> Result<Verification, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.verify_script.lock().unwrap().clone();
        match script {
            Script::Success { amount } => Ok(Verification {
                success: true,
                raw_status: "success".into(),
                amount,
                message: "Approved".into(),
            }),
            Script::Declined => Ok(Verification {
                success: false,
                raw_status: "failed".into(),
                amount: None,
                message: "Declined".into(),
            }),
            Script::Pending => Ok(Verification {
                success: false,
                raw_status: "ongoing".into(),
                amount: None,
                message: "Verification successful".into(),
            }),
            Script::Abandoned => Ok(Verification {
                success: false,
                raw_status: "abandoned".into(),
                amount: None,
                message: "The transaction was not completed".into(),
            }),
            Script::Timeout => Err(GatewayError::Timeout),
            Script::Rejected(message) => Err(GatewayError::Rejected(message)),
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-jwt-secret".into(),
        frontend_url: "http://localhost:5173".into(),
        gateway: GatewayConfig {
            base_url: "http://127.0.0.1:9".into(),
            secret_key: "sk_test".into(),
            webhook_secret: WEBHOOK_SECRET.into(),
            timeout_seconds: 1,
            currency: "NGN".into(),
        },
    }
}

/// Fresh in-memory database with one pooled connection, so concurrent
/// transactions queue on the pool the way row locks queue them in Postgres.
pub async fn setup() -> anyhow::Result<(AppState, Arc<FakeGateway>)> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let orm = Database::connect(options).await?;
    run_migrations(&orm).await?;

    let gateway = Arc::new(FakeGateway::default());
    let state = AppState {
        orm,
        config: Arc::new(test_config()),
        gateway: gateway.clone(),
    };
    Ok((state, gateway))
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@example.com")),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(AuthUser {
        user_id: id,
        role: role.to_string(),
    })
}

pub async fn create_food(state: &AppState, name: &str, price: i64) -> anyhow::Result<FoodModel> {
    let now = Utc::now();
    let food = FoodActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        discount_price: Set(None),
        is_available: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(food)
}

pub fn add_request(food_id: Uuid, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        food_id,
        quantity,
        selected_variant: None,
        selected_addons: None,
        notes: None,
    }
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    food: &FoodModel,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_item(state, user, add_request(food.id, quantity)).await?;
    Ok(())
}

pub fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        delivery_address: "12 Allen Avenue, Ikeja".into(),
        phone_number: "+2348012345678".into(),
        notes: None,
    }
}

pub async fn checkout(state: &AppState, user: &AuthUser) -> anyhow::Result<OrderWithItems> {
    let resp = order_service::checkout(state, user, checkout_request()).await?;
    resp.data
        .ok_or_else(|| anyhow::anyhow!("checkout returned no data"))
}

/// 2 x 500 + 1 x 1200 kobo: an order totalling 2200.
pub async fn order_of_2200(state: &AppState, user: &AuthUser) -> anyhow::Result<OrderWithItems> {
    let rice = create_food(state, "Jollof Rice", 500).await?;
    let suya = create_food(state, "Chicken Suya", 1200).await?;
    add_to_cart(state, user, &rice, 2).await?;
    add_to_cart(state, user, &suya, 1).await?;
    checkout(state, user).await
}

pub async fn reload_order(state: &AppState, id: Uuid) -> anyhow::Result<OrderModel> {
    Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("order {id} missing"))
}

pub async fn reload_payment(state: &AppState, reference: &str) -> anyhow::Result<PaymentModel> {
    Payments::find()
        .filter(PaymentCol::Reference.eq(reference))
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("payment {reference} missing"))
}

pub async fn history(state: &AppState, order_id: Uuid) -> anyhow::Result<Vec<HistoryModel>> {
    Ok(ledger::history_for(&state.orm, order_id).await?)
}

pub async fn payment_events(state: &AppState, order_id: Uuid) -> anyhow::Result<usize> {
    Ok(history(state, order_id)
        .await?
        .iter()
        .filter(|entry| entry.kind == HistoryKind::PaymentEvent)
        .count())
}

/// Raw webhook body for `event`; `amount` is in kobo, as Paystack sends it.
pub fn webhook_body(event: &str, reference: &str, amount: i64) -> Vec<u8> {
    serde_json::json!({
        "event": event,
        "data": {
            "reference": reference,
            "amount": amount,
            "status": if event == "charge.success" { "success" } else { "failed" },
            "gateway_response": if event == "charge.success" { "Approved" } else { "Insufficient funds" },
        }
    })
    .to_string()
    .into_bytes()
}

pub fn sign(body: &[u8]) -> String {
    signature::sign(body, WEBHOOK_SECRET).expect("sign webhook body")
}
