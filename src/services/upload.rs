//! Signed upload credentials for the external asset host.
//!
//! Clients upload directly to the host; the backend only signs the
//! request parameters so the API secret never leaves the server.

use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::config::UploadConfig;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadSignature {
    pub signature: String,
    pub timestamp: i64,
    pub cloud_name: String,
    pub api_key: String,
    pub folder: String,
}

/// Sign the upload parameter string the way the asset host expects:
/// sorted `key=value` pairs joined with `&`, secret appended, hex digest.
pub fn sign_upload(config: &UploadConfig, timestamp: i64) -> UploadSignature {
    let to_sign = format!(
        "folder={}&timestamp={}{}",
        config.folder, timestamp, config.api_secret
    );

    let digest = Sha256::digest(to_sign.as_bytes());

    UploadSignature {
        signature: hex::encode(digest),
        timestamp,
        cloud_name: config.cloud_name.clone(),
        api_key: config.api_key.clone(),
        folder: config.folder.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> UploadConfig {
        UploadConfig {
            cloud_name: "demo".to_string(),
            api_key: "key123".to_string(),
            api_secret: "secret456".to_string(),
            folder: "avatars".to_string(),
        }
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = sign_upload(&config(), 1_700_000_000);
        let b = sign_upload(&config(), 1_700_000_000);
        assert_eq!(a.signature, b.signature);
        assert_eq!(a.signature.len(), 64);
    }

    #[test]
    fn test_signature_varies_with_timestamp_and_secret() {
        let base = sign_upload(&config(), 1_700_000_000);
        let later = sign_upload(&config(), 1_700_000_001);
        assert_ne!(base.signature, later.signature);

        let mut other = config();
        other.api_secret = "different".to_string();
        let other_sig = sign_upload(&other, 1_700_000_000);
        assert_ne!(base.signature, other_sig.signature);
    }
}
