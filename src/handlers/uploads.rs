//! Signed upload credentials for client-side asset uploads.

use axum::{Json, extract::State};

use crate::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::roles::authorize;
use crate::error::Result;
use crate::services::upload::{UploadSignature, sign_upload};

/// GET /api/upload/signature
pub async fn get_upload_signature(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UploadSignature>> {
    authorize(user.role, "uploads", "sign")?;

    let timestamp = chrono::Utc::now().timestamp();
    Ok(Json(sign_upload(&state.config.upload, timestamp)))
}
