use std::env;

/// Settings for the payment provider, handed to the gateway client and the
/// payment reconciler when the application state is built.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub timeout_seconds: u64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub gateway: GatewayConfig,
}

impl GatewayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let secret_key = env::var("PAYSTACK_SECRET_KEY")?;
        // Paystack signs webhooks with the secret key unless a dedicated one is configured.
        let webhook_secret =
            env::var("PAYSTACK_WEBHOOK_SECRET").unwrap_or_else(|_| secret_key.clone());
        let timeout_seconds = env::var("PAYSTACK_TIMEOUT_SECONDS")
            .ok()
            .and_then(|t| t.parse::<u64>().ok())
            .filter(|t| *t > 0)
            .unwrap_or(10);
        Ok(Self {
            base_url: env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            secret_key,
            webhook_secret,
            timeout_seconds,
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "NGN".to_string()),
        })
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            frontend_url,
            gateway: GatewayConfig::from_env()?,
        })
    }
}
