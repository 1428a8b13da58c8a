use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: i64,
    pub cors_allowed_origins: Vec<String>,
    pub email: EmailConfig,
    pub theme: ThemeConfig,
    pub catalog: CatalogConfig,
    pub ml: MlConfig,
    pub upload: UploadConfig,
    pub payment: PaymentConfig,
    pub outbox: OutboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_name: String,
    pub from_address: String,
    pub enabled: bool,
}

/// Branding applied to every outgoing email. Templates are pure functions
/// of this struct; nothing reads theme state from anywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub brand_name: String,
    pub brand_color: String,
    pub accent_color: String,
    pub danger_color: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub source_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlConfig {
    pub service_url: Option<String>,
    pub retrain_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub upi_id: String,
    pub payee_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    pub poll_interval_secs: u64,
    pub max_attempts: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiration: env::var("JWT_EXPIRATION")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86400),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            email: EmailConfig {
                smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                smtp_port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .unwrap_or(587),
                smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
                smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "MyStorX".to_string()),
                from_address: env::var("EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "noreply@mystorx.com".to_string()),
                enabled: env::var("EMAIL_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .unwrap_or(true),
            },
            theme: ThemeConfig {
                brand_name: env::var("BRAND_NAME").unwrap_or_else(|_| "MyStorX".to_string()),
                brand_color: env::var("BRAND_COLOR").unwrap_or_else(|_| "#0d6efd".to_string()),
                accent_color: env::var("BRAND_ACCENT_COLOR")
                    .unwrap_or_else(|_| "#28a745".to_string()),
                danger_color: env::var("BRAND_DANGER_COLOR")
                    .unwrap_or_else(|_| "#dc3545".to_string()),
                base_url: env::var("STOREFRONT_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            catalog: CatalogConfig {
                source_url: env::var("CATALOG_SOURCE_URL")
                    .unwrap_or_else(|_| "https://fakestoreapi.com/products".to_string()),
            },
            ml: MlConfig {
                service_url: env::var("ML_SERVICE_URL").ok(),
                retrain_url: env::var("ML_RETRAIN_URL").ok(),
            },
            upload: UploadConfig {
                cloud_name: env::var("ASSET_CLOUD_NAME").unwrap_or_default(),
                api_key: env::var("ASSET_API_KEY").unwrap_or_default(),
                api_secret: env::var("ASSET_API_SECRET").unwrap_or_default(),
                folder: env::var("ASSET_UPLOAD_FOLDER").unwrap_or_else(|_| "avatars".to_string()),
            },
            payment: PaymentConfig {
                upi_id: env::var("PAYMENT_UPI_ID").unwrap_or_else(|_| "8885674269@ybl".to_string()),
                payee_name: env::var("PAYMENT_PAYEE_NAME")
                    .unwrap_or_else(|_| "MyStorX".to_string()),
            },
            outbox: OutboxConfig {
                poll_interval_secs: env::var("OUTBOX_POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .unwrap_or(15),
                max_attempts: env::var("OUTBOX_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
            },
        })
    }
}
