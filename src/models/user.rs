use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Column list for user queries; enum columns are read back as text.
pub const USER_COLUMNS: &str = "id, name, email, password_hash, phone, avatar_url, \
     avatar_public_id, role::text AS role, status::text AS status, is_email_verified, \
     created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub avatar_public_id: Option<String>,
    pub role: String,
    pub status: String,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// User shape exposed by profile and auth endpoints; never carries the hash.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            avatar: user.avatar_url.clone(),
            role: user.role.clone(),
        }
    }
}
