use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{config::AppConfig, gateway::PaymentGateway};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub gateway: Arc<dyn PaymentGateway>,
}
