pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod services;

pub use config::Config;
pub use error::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Config,
    pub jwt_service: auth::jwt::JwtService,
    pub email_service: services::EmailService,
    pub catalog_sync: services::CatalogSyncService,
    pub recommendation_service: services::RecommendationService,
}
