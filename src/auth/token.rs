//! Access token verification
//!
//! Tokens are HMAC-signed blobs minted by the external auth service with
//! a secret shared with this backend. No server-side token storage is
//! needed; verification is signature + expiry only.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Verified caller identity carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// The authenticated user's id
    pub user_id: String,
    /// When the token was issued
    pub created_at: DateTime<Utc>,
    /// When the token expires
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Create a signed access token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// The auth service is the normal issuer; this function exists so tests
/// and tooling can mint tokens against the shared secret.
///
/// # Arguments
/// * `user_id` - Subject user id
/// * `secret` - HMAC secret key
/// * `max_age_seconds` - Token lifetime
pub fn create_access_token(
    user_id: &str,
    secret: &str,
    max_age_seconds: i64,
) -> Result<String, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let now = Utc::now();
    let token = AccessToken {
        user_id: user_id.to_string(),
        created_at: now,
        expires_at: now + Duration::seconds(max_age_seconds),
    };

    // 1. Serialize token to JSON
    let payload =
        serde_json::to_string(&token).map_err(|e| crate::error::AppError::Internal(e.into()))?;

    // 2. Base64 encode the payload
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Token(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode an access token
///
/// # Returns
/// Decoded token if the signature is valid and the token is not expired
///
/// # Errors
/// Returns `Unauthorized` if the token is malformed, forged, or expired
pub fn verify_access_token(
    token: &str,
    secret: &str,
) -> Result<AccessToken, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Split token into payload and signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(crate::error::AppError::Unauthorized);
    }

    let payload_b64 = parts[0];
    let signature_b64 = parts[1];

    // 2. Verify HMAC signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Token(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    // 3. Decode and deserialize payload
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    let payload_str =
        String::from_utf8(payload_bytes).map_err(|_| crate::error::AppError::Unauthorized)?;

    let token: AccessToken =
        serde_json::from_str(&payload_str).map_err(|_| crate::error::AppError::Unauthorized)?;

    // 4. Check expiry
    if token.is_expired() {
        return Err(crate::error::AppError::Unauthorized);
    }

    Ok(token)
}
