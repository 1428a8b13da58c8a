use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::Claims;

/// JWT issuance and validation, keyed by the configured signing secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_secs", &self.expiration_secs)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &str, expiration_secs: i64) -> Result<Self> {
        if secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 characters");
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs,
        })
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    pub fn issue_token(&self, user_id: uuid::Uuid, role: &str) -> Result<String> {
        let claims = Claims::new(user_id, role.to_string(), self.expiration_secs);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to encode JWT")
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&["storefront-api"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Failed to decode JWT")?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn service() -> JwtService {
        JwtService::new("unit-test-secret-key-0123456789", 3600).unwrap()
    }

    #[test]
    fn test_issue_and_decode_round_trip() {
        let svc = service();
        let user_id = Uuid::new_v4();

        let token = svc.issue_token(user_id, "delivery").unwrap();
        let claims = svc.decode_token(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "delivery");
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_rejects_token_from_other_secret() {
        let other = JwtService::new("a-completely-different-secret", 3600).unwrap();
        let token = other.issue_token(Uuid::new_v4(), "user").unwrap();

        assert!(service().decode_token(&token).is_err());
    }

    #[test]
    fn test_rejects_short_secret() {
        assert!(JwtService::new("short", 3600).is_err());
    }
}
