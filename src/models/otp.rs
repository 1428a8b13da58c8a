use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// One-time-passcode lifetime.
pub const OTP_TTL_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Register,
    ResetPassword,
    DeliveryRegister,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Register => "register",
            OtpPurpose::ResetPassword => "reset_password",
            OtpPurpose::DeliveryRegister => "delivery_register",
        }
    }
}

impl std::str::FromStr for OtpPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" => Ok(OtpPurpose::Register),
            "reset_password" => Ok(OtpPurpose::ResetPassword),
            "delivery_register" => Ok(OtpPurpose::DeliveryRegister),
            other => Err(format!("Invalid OTP purpose: {}", other)),
        }
    }
}

/// Pending registration fields held until the code is verified. The
/// password is hashed before it ever reaches this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub name: String,
    pub password_hash: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Otp {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    pub purpose: String,
    pub payload: Option<Json<RegistrationPayload>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Otp {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Generate a 6-digit numeric code.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(100_000..=999_999).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn test_purpose_round_trip() {
        for purpose in [
            OtpPurpose::Register,
            OtpPurpose::ResetPassword,
            OtpPurpose::DeliveryRegister,
        ] {
            assert_eq!(purpose.as_str().parse::<OtpPurpose>().unwrap(), purpose);
        }
    }
}
