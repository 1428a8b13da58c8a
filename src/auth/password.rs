use crate::error::{ApiError, Result};

const BCRYPT_COST: u32 = 10;

/// Password hashing and verification (bcrypt).
pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str) -> Result<String> {
        bcrypt::hash(password, BCRYPT_COST)
            .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        bcrypt::verify(password, hash)
            .map_err(|e| ApiError::Internal(format!("Failed to verify password: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = PasswordService::hash_password("s3cret-pass").unwrap();
        assert_ne!(hash, "s3cret-pass");
        assert!(PasswordService::verify_password("s3cret-pass", &hash).unwrap());
        assert!(!PasswordService::verify_password("wrong-pass", &hash).unwrap());
    }
}
