use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::AppState;
use crate::auth::Role;
use crate::error::ApiError;

/// Authenticated user loaded from the database for the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Debug, sqlx::FromRow)]
struct CurrentUserRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    role: String,
}

/// JWT authentication middleware.
///
/// Decodes the bearer token and loads the subject's user row, so handlers
/// always see the current role and contact details rather than stale claims.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    let token = match auth_header {
        Some(value) if value.starts_with("Bearer ") => &value[7..],
        _ => {
            return ApiError::Unauthorized("Not authorized, token missing".to_string())
                .into_response();
        }
    };

    let claims = match state.jwt_service.decode_token(token) {
        Ok(claims) => claims,
        Err(_) => {
            return ApiError::Unauthorized("Invalid or expired token".to_string()).into_response();
        }
    };

    let row = sqlx::query_as::<_, CurrentUserRow>(
        "SELECT id, name, email, phone, role::text AS role FROM users WHERE id = $1",
    )
    .bind(claims.sub)
    .fetch_optional(&state.db)
    .await;

    match row {
        Ok(Some(user)) => {
            let role = match user.role.parse::<Role>() {
                Ok(role) => role,
                Err(_) => {
                    return ApiError::Internal(format!("Unknown role for user {}", user.id))
                        .into_response();
                }
            };

            request.extensions_mut().insert(CurrentUser {
                id: user.id,
                name: user.name,
                email: user.email,
                phone: user.phone,
                role,
            });
            next.run(request).await
        }
        Ok(None) => ApiError::Unauthorized("User not found".to_string()).into_response(),
        Err(e) => ApiError::Database(e).into_response(),
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("No authentication found".to_string()))
    }
}
