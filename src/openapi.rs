//! OpenAPI document, served as plain JSON at /api/docs/openapi.json.

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Multi-role storefront backend: customer shop, admin console, delivery console",
        version = "0.1.0"
    ),
    paths(
        handlers::health::health_check,
        handlers::auth::register,
        handlers::auth::verify_otp,
        handlers::auth::login,
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::payments::initiate_payment,
        handlers::payments::confirm_payment,
        handlers::products::list_products,
        handlers::products::get_product,
    ),
    components(schemas(
        models::Order,
        models::OrderItem,
        models::PaymentResult,
        models::Product,
        models::PublicUser,
        crate::auth::AuthResponse,
        crate::auth::AuthUserInfo,
    )),
    tags(
        (name = "auth", description = "OTP-gated authentication"),
        (name = "orders", description = "Order lifecycle"),
        (name = "payments", description = "Payment attempts"),
        (name = "products", description = "Catalog"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
