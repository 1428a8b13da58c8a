use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

use storefront_api::auth::jwt::JwtService;
use storefront_api::handlers::{
    admin, auth as auth_handlers, cart, delivery, health, orders, payments, products,
    recommendations, uploads,
};
use storefront_api::{AppState, Config, auth, database, middleware, openapi, services};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_api=debug,tower_http=info".into()),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration for environment: {}", config.environment);

    // Setup database connection and run migrations
    let db_pool = database::setup_database(&config.database_url).await?;
    database::run_migrations(&db_pool).await?;

    // Initialize authentication service
    let jwt_service = JwtService::new(&config.jwt_secret, config.jwt_expiration)?;
    info!("Authentication service initialized");

    // Initialize email service and the outbox dispatcher draining it
    let email_service = services::EmailService::new(&config.email, db_pool.clone())?;
    let dispatcher = services::OutboxDispatcher::new(
        db_pool.clone(),
        email_service.clone(),
        &config.outbox,
    );
    dispatcher.start();

    // External collaborators
    let catalog_sync = services::CatalogSyncService::new(config.catalog.source_url.clone());
    let recommendation_service = services::RecommendationService::new(
        config.ml.service_url.clone(),
        config.ml.retrain_url.clone(),
    );
    info!("Catalog sync and recommendation services initialized");

    let app_state = AppState {
        db: db_pool,
        config: config.clone(),
        jwt_service,
        email_service,
        catalog_sync,
        recommendation_service,
    };

    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/docs/openapi.json",
            get(|| async { axum::Json(openapi::ApiDoc::openapi()) }),
        )
        // Authentication
        .route("/api/auth/register", post(auth_handlers::register))
        .route(
            "/api/auth/register-delivery",
            post(auth_handlers::register_delivery),
        )
        .route("/api/auth/verify-otp", post(auth_handlers::verify_otp))
        .route("/api/auth/resend-otp", post(auth_handlers::resend_otp))
        .route("/api/auth/login", post(auth_handlers::login))
        .route(
            "/api/auth/forgot-password",
            post(auth_handlers::forgot_password),
        )
        .route(
            "/api/auth/reset-password",
            post(auth_handlers::reset_password),
        )
        // Catalog
        .route("/api/products", get(products::list_products))
        .route("/api/products/{id}", get(products::get_product))
        // Recommendations
        .route(
            "/api/recommendations/product/{external_id}",
            get(recommendations::product_recommendations),
        )
        .route(
            "/api/recommendations/cart",
            post(recommendations::cart_recommendations),
        );

    // Routes requiring a valid bearer token
    let protected_routes = Router::new()
        // Profile
        .route("/api/auth/profile", get(auth_handlers::get_profile))
        .route("/api/auth/profile", put(auth_handlers::update_profile))
        .route("/api/auth/profile/mini", get(auth_handlers::get_mini_profile))
        // Cart
        .route("/api/cart", get(cart::get_cart))
        .route("/api/cart", delete(cart::clear_cart))
        .route("/api/cart/add", post(cart::add_item))
        .route("/api/cart/{product_id}", put(cart::update_quantity))
        .route("/api/cart/{product_id}", delete(cart::remove_item))
        // Orders
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/my", get(orders::my_orders))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/cancel", put(orders::cancel_order))
        .route("/api/orders/{id}/pay", put(orders::pay_order))
        .route("/api/orders/{id}/deliver", put(delivery::deliver_order))
        // Payments
        .route("/api/payments/initiate", post(payments::initiate_payment))
        .route(
            "/api/payments/verify/{order_id}",
            get(payments::verify_payment),
        )
        .route(
            "/api/payments/confirm/{order_id}",
            post(payments::confirm_payment),
        )
        // Catalog sync (admin-gated in the handler)
        .route("/api/products/sync", post(products::sync_products))
        // Admin console
        .route("/api/admin/orders", get(admin::list_orders))
        .route(
            "/api/admin/orders/{id}/status",
            put(admin::update_order_status),
        )
        .route(
            "/api/admin/orders/{id}/assign",
            put(admin::assign_delivery_partner),
        )
        .route("/api/admin/delivery", get(admin::list_delivery_partners))
        .route(
            "/api/admin/superadmin/analytics",
            get(admin::superadmin_analytics),
        )
        .route("/api/admin/products", get(admin::list_all_products))
        .route("/api/admin/products", post(admin::create_product))
        .route("/api/admin/products/{id}", put(admin::update_product))
        .route("/api/admin/products/{id}", delete(admin::delete_product))
        .route("/api/admin/ml/retrain", post(admin::trigger_ml_retrain))
        // Delivery console
        .route("/api/delivery/my-orders", get(delivery::my_assigned_orders))
        .route("/api/delivery/{id}/deliver", put(delivery::deliver_order))
        .route("/api/delivery/{id}/mark-paid", put(delivery::mark_cod_paid))
        // Uploads
        .route("/api/upload/signature", get(uploads::get_upload_signature))
        .layer(from_fn_with_state(
            app_state.clone(),
            auth::middleware::auth_middleware,
        ));

    let cors = if config.cors_allowed_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = public_routes
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::add_security_headers))
                .layer(axum::middleware::from_fn(
                    middleware::request_logger_middleware,
                ))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
                .layer(cors),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting storefront API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGTERM or SIGINT signal for graceful shutdown
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
