//! Authentication and profile handlers.
//!
//! Registration is OTP-gated: no user row exists until the emailed code
//! is verified, at which point the pending payload becomes the account.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::password::PasswordService;
use crate::auth::{AuthResponse, AuthUserInfo};
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::otp::{self, OTP_TTL_MINUTES, Otp, OtpPurpose, RegistrationPayload};
use crate::models::user::USER_COLUMNS;
use crate::models::{PublicUser, User};
use crate::services::email::templates;
use crate::services::outbox::{self, NotificationKind};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,

    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 6))]
    pub otp: String,

    /// Disambiguates when both a registration and a reset are in flight.
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResendOtpRequest {
    #[validate(email)]
    pub email: String,

    pub purpose: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 6))]
    pub otp: String,

    #[validate(length(min = 6, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    pub phone: Option<String>,

    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,

    pub current_password: Option<String>,

    pub avatar_url: Option<String>,
    pub avatar_public_id: Option<String>,

    /// Set to drop the current avatar.
    pub remove_avatar: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OtpSentResponse {
    pub message: String,
}

async fn fetch_user_by_email(state: &AppState, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = $1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(&state.db)
    .await?;

    Ok(user)
}

/// Shared entry point for customer and delivery-partner registration:
/// stage the pending account under an OTP, no user row yet.
async fn start_registration(
    state: &AppState,
    request: RegisterRequest,
    purpose: OtpPurpose,
) -> Result<Json<OtpSentResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let email = request.email.trim().to_lowercase();

    if fetch_user_by_email(state, &email).await?.is_some() {
        return Err(ApiError::already_exists("User"));
    }

    let code = otp::generate_code();
    let payload = RegistrationPayload {
        name: request.name.clone(),
        password_hash: PasswordService::hash_password(&request.password)?,
        phone: request.phone.clone(),
    };
    let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

    sqlx::query(
        "INSERT INTO otps (id, email, code, purpose, payload, expires_at)
         VALUES ($1, $2, $3, ($4)::otp_purpose, $5, $6)
         ON CONFLICT (email, purpose)
         DO UPDATE SET code = EXCLUDED.code, payload = EXCLUDED.payload,
                       expires_at = EXCLUDED.expires_at, updated_at = NOW()",
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&code)
    .bind(purpose.as_str())
    .bind(SqlJson(&payload))
    .bind(expires_at)
    .execute(&state.db)
    .await?;

    let content = templates::verify_otp_email(&state.config.theme, &request.name, &code);
    outbox::enqueue_best_effort(&state.db, &email, NotificationKind::VerifyOtp, &content, None)
        .await;

    Ok(Json(OtpSentResponse {
        message: format!("OTP sent (valid for {} minutes)", OTP_TTL_MINUTES),
    }))
}

/// Begin customer registration.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "OTP sent", body = OtpSentResponse),
        (status = 400, description = "Validation error or user already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<OtpSentResponse>> {
    start_registration(&state, request, OtpPurpose::Register).await
}

/// Begin delivery-partner registration.
pub async fn register_delivery(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<OtpSentResponse>> {
    start_registration(&state, request, OtpPurpose::DeliveryRegister).await
}

async fn find_otp(
    state: &AppState,
    email: &str,
    purpose: Option<OtpPurpose>,
) -> Result<Option<Otp>> {
    let otp = match purpose {
        Some(purpose) => {
            sqlx::query_as::<_, Otp>(
                "SELECT id, email, code, purpose::text AS purpose, payload, expires_at,
                        created_at, updated_at
                   FROM otps WHERE email = $1 AND purpose = ($2)::otp_purpose",
            )
            .bind(email)
            .bind(purpose.as_str())
            .fetch_optional(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Otp>(
                "SELECT id, email, code, purpose::text AS purpose, payload, expires_at,
                        created_at, updated_at
                   FROM otps WHERE email = $1
                  ORDER BY updated_at DESC LIMIT 1",
            )
            .bind(email)
            .fetch_optional(&state.db)
            .await?
        }
    };

    Ok(otp)
}

async fn delete_otp(state: &AppState, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM otps WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(())
}

fn auth_response(state: &AppState, user: &User) -> Result<AuthResponse> {
    let token = state
        .jwt_service
        .issue_token(user.id, &user.role)
        .map_err(|e| ApiError::Internal(format!("Failed to issue token: {}", e)))?;

    Ok(AuthResponse {
        token,
        expires_in: state.jwt_service.expiration_secs(),
        user: AuthUserInfo {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        },
    })
}

/// Verify an OTP. For registration purposes this creates the account and
/// logs the new user in; for password reset it only acknowledges.
#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    tag = "auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP verified"),
        (status = 400, description = "Missing, expired or wrong code")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let email = request.email.trim().to_lowercase();
    let purpose = match &request.purpose {
        Some(raw) => Some(
            raw.parse::<OtpPurpose>()
                .map_err(|e| ApiError::BadRequest(e))?,
        ),
        None => None,
    };

    let record = find_otp(&state, &email, purpose)
        .await?
        .ok_or_else(|| ApiError::BadRequest("OTP not found. Please request a new one.".into()))?;

    if record.is_expired() {
        delete_otp(&state, record.id).await?;
        return Err(ApiError::BadRequest(
            "OTP expired. Please request a new one.".into(),
        ));
    }

    if record.code != request.otp {
        return Err(ApiError::with_code(ErrorCode::InvalidOtp, "Invalid OTP"));
    }

    let record_purpose: OtpPurpose = record
        .purpose
        .parse()
        .map_err(|e: String| ApiError::Internal(e))?;

    match record_purpose {
        OtpPurpose::Register | OtpPurpose::DeliveryRegister => {
            let payload = match &record.payload {
                Some(payload) => payload.0.clone(),
                None => {
                    delete_otp(&state, record.id).await?;
                    return Err(ApiError::BadRequest(
                        "Registration expired. Please register again.".into(),
                    ));
                }
            };

            let role = match record_purpose {
                OtpPurpose::DeliveryRegister => "delivery",
                _ => "user",
            };

            let user = sqlx::query_as::<_, User>(&format!(
                "INSERT INTO users (id, name, email, password_hash, phone, role, status,
                                    is_email_verified)
                 VALUES ($1, $2, $3, $4, $5, ($6)::user_role, 'active', TRUE)
                 RETURNING {}",
                USER_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(&payload.name)
            .bind(&email)
            .bind(&payload.password_hash)
            .bind(&payload.phone)
            .bind(role)
            .fetch_one(&state.db)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    ApiError::already_exists("User")
                }
                _ => ApiError::Database(e),
            })?;

            let content = templates::welcome_email(&state.config.theme, &user.name);
            outbox::enqueue_best_effort(
                &state.db,
                &user.email,
                NotificationKind::Welcome,
                &content,
                None,
            )
            .await;

            delete_otp(&state, record.id).await?;

            let response = auth_response(&state, &user)?;
            Ok((StatusCode::OK, Json(serde_json::to_value(response)?)))
        }
        OtpPurpose::ResetPassword => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "message": "OTP verified for password reset" })),
        )),
    }
}

/// Regenerate the code for an in-flight OTP.
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(request): Json<ResendOtpRequest>,
) -> Result<Json<OtpSentResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let email = request.email.trim().to_lowercase();
    let purpose: OtpPurpose = request
        .purpose
        .parse()
        .map_err(|e: String| ApiError::BadRequest(e))?;

    let record = find_otp(&state, &email, Some(purpose)).await?.ok_or_else(|| {
        ApiError::not_found("OTP")
    })?;

    let code = otp::generate_code();
    let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

    sqlx::query("UPDATE otps SET code = $2, expires_at = $3, updated_at = NOW() WHERE id = $1")
        .bind(record.id)
        .bind(&code)
        .bind(expires_at)
        .execute(&state.db)
        .await?;

    let (kind, content) = match purpose {
        OtpPurpose::ResetPassword => {
            let name = fetch_user_by_email(&state, &email)
                .await?
                .map(|u| u.name)
                .unwrap_or_else(|| "there".to_string());
            (
                NotificationKind::ResetPasswordOtp,
                templates::reset_password_otp_email(&state.config.theme, &name, &code),
            )
        }
        _ => (
            NotificationKind::ResendOtp,
            templates::resend_otp_email(&state.config.theme, &code),
        ),
    };
    outbox::enqueue_best_effort(&state.db, &email, kind, &content, None).await;

    Ok(Json(OtpSentResponse {
        message: format!("OTP resent (valid for {} minutes)", OTP_TTL_MINUTES),
    }))
}

/// Password login.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account is blocked")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let email = request.email.trim().to_lowercase();

    let user = fetch_user_by_email(&state, &email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !PasswordService::verify_password(&request.password, &user.password_hash)? {
        return Err(ApiError::invalid_credentials());
    }

    if !user.is_active() {
        return Err(ApiError::with_code(
            ErrorCode::AccountInactive,
            "Account is blocked",
        ));
    }

    Ok(Json(auth_response(&state, &user)?))
}

/// Start a password reset: replace any previous reset OTP and email a code.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<OtpSentResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let email = request.email.trim().to_lowercase();

    let user = fetch_user_by_email(&state, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let code = otp::generate_code();
    let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

    sqlx::query(
        "INSERT INTO otps (id, email, code, purpose, expires_at)
         VALUES ($1, $2, $3, 'reset_password', $4)
         ON CONFLICT (email, purpose)
         DO UPDATE SET code = EXCLUDED.code, payload = NULL,
                       expires_at = EXCLUDED.expires_at, updated_at = NOW()",
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&code)
    .bind(expires_at)
    .execute(&state.db)
    .await?;

    // Email must never block the reset flow.
    let content = templates::reset_password_otp_email(&state.config.theme, &user.name, &code);
    outbox::enqueue_best_effort(
        &state.db,
        &email,
        NotificationKind::ResetPasswordOtp,
        &content,
        None,
    )
    .await;

    Ok(Json(OtpSentResponse {
        message: "OTP generated for password reset".to_string(),
    }))
}

/// Complete a password reset with a verified OTP.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<OtpSentResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let email = request.email.trim().to_lowercase();

    let record = find_otp(&state, &email, Some(OtpPurpose::ResetPassword))
        .await?
        .ok_or_else(|| ApiError::BadRequest("OTP not found".into()))?;

    if record.is_expired() {
        delete_otp(&state, record.id).await?;
        return Err(ApiError::BadRequest("OTP expired".into()));
    }

    if record.code != request.otp {
        return Err(ApiError::with_code(ErrorCode::InvalidOtp, "Invalid OTP"));
    }

    let user = fetch_user_by_email(&state, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let password_hash = PasswordService::hash_password(&request.new_password)?;

    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .bind(&password_hash)
        .execute(&state.db)
        .await?;

    sqlx::query("DELETE FROM otps WHERE email = $1 AND purpose = 'reset_password'")
        .bind(&email)
        .execute(&state.db)
        .await?;

    Ok(Json(OtpSentResponse {
        message: "Password reset successful".to_string(),
    }))
}

async fn fetch_user(state: &AppState, id: Uuid) -> Result<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// Full profile for the authenticated user.
pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<PublicUser>> {
    let user = fetch_user(&state, user.id).await?;
    Ok(Json(PublicUser::from(&user)))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MiniProfile {
    pub name: String,
    pub avatar: Option<String>,
}

/// Name + avatar, for navigation chrome.
pub async fn get_mini_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MiniProfile>> {
    let user = fetch_user(&state, user.id).await?;
    Ok(Json(MiniProfile {
        name: user.name,
        avatar: user.avatar_url,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileUpdateResponse {
    pub message: String,
    pub user: PublicUser,
}

/// Patch name/phone, change password, or swap the avatar.
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileUpdateResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let mut user = fetch_user(&state, current.id).await?;

    if let Some(name) = &request.name {
        user.name = name.clone();
    }
    if let Some(phone) = &request.phone {
        user.phone = Some(phone.clone());
    }

    if let Some(new_password) = &request.password {
        let current_password = request
            .current_password
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("Current password is required".into()))?;

        if !PasswordService::verify_password(current_password, &user.password_hash)? {
            return Err(ApiError::BadRequest("Current password is incorrect".into()));
        }

        user.password_hash = PasswordService::hash_password(new_password)?;
    }

    if request.remove_avatar.unwrap_or(false) {
        user.avatar_url = None;
        user.avatar_public_id = None;
    } else if let (Some(url), Some(public_id)) =
        (&request.avatar_url, &request.avatar_public_id)
    {
        user.avatar_url = Some(url.clone());
        user.avatar_public_id = Some(public_id.clone());
    }

    sqlx::query(
        "UPDATE users SET name = $2, phone = $3, password_hash = $4, avatar_url = $5,
                avatar_public_id = $6, updated_at = NOW()
          WHERE id = $1",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.phone)
    .bind(&user.password_hash)
    .bind(&user.avatar_url)
    .bind(&user.avatar_public_id)
    .execute(&state.db)
    .await?;

    Ok(Json(ProfileUpdateResponse {
        message: "Profile updated successfully".to_string(),
        user: PublicUser::from(&user),
    }))
}
