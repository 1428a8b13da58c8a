use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod roles;

pub use roles::{Permission, Role};

/// User claims for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    pub sub: Uuid,    // Subject (user ID)
    pub role: String, // User role (user, admin, superadmin, delivery)
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
    pub iss: String,  // Issuer
}

impl Claims {
    pub fn new(user_id: Uuid, role: String, expiration_secs: i64) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            role,
            exp: now.timestamp() + expiration_secs,
            iat: now.timestamp(),
            iss: "storefront-api".to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Authentication response returned by login and OTP verification
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: AuthUserInfo,
}

/// User information for authentication responses
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthUserInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_expiration() {
        let claims = Claims::new(Uuid::new_v4(), "user".to_string(), 86400);
        assert!(!claims.is_expired());

        let stale = Claims {
            exp: Utc::now().timestamp() - 10,
            ..claims
        };
        assert!(stale.is_expired());
    }
}
