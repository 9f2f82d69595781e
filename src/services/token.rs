use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Mixed into the signing key so a reset token can never be mistaken for a
/// token minted against the same secret for another purpose.
const DOMAIN_LABEL: &[u8] = b"auth";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("reset token has expired")]
    Expired,

    #[error("reset token is invalid")]
    Invalid,
}

/// Identity a reset token carries. Resolved back to a user at verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    pub user_id: i32,
    pub username: String,
}

/// Issues and verifies the signed, time-limited tokens embedded in
/// password-reset links.
///
/// Wire shape is `base64url(claims).base64url(issued_at).base64url(mac)`
/// with no padding. Nothing is persisted: the issue time travels inside
/// the token and the validity window is enforced at verification.
pub struct ResetTokenSigner {
    key: Vec<u8>,
    max_age_seconds: i64,
}

impl ResetTokenSigner {
    #[must_use]
    pub fn new(secret: &str, max_age_seconds: i64) -> Self {
        // Derive the signing key by keying the secret with the fixed
        // domain label.
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(DOMAIN_LABEL);
        let key = mac.finalize().into_bytes().to_vec();

        Self {
            key,
            max_age_seconds,
        }
    }

    /// Issue a token for `user_id`/`username`, stamped with the current time.
    #[must_use]
    pub fn issue(&self, user_id: i32, username: &str) -> String {
        self.issue_at(user_id, username, Utc::now().timestamp())
    }

    fn issue_at(&self, user_id: i32, username: &str, issued_at: i64) -> String {
        let claims = serde_json::json!({
            "user_id": user_id,
            "username": username,
        });

        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let timestamp = URL_SAFE_NO_PAD.encode(issued_at.to_be_bytes());
        let signing_input = format!("{payload}.{timestamp}");
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));

        format!("{signing_input}.{signature}")
    }

    /// Verify a token against the current clock.
    pub fn verify(&self, token: &str) -> Result<ResetClaims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token against an explicit `now` (unix seconds). The MAC is
    /// checked in constant time before the timestamp is even decoded, so a
    /// forged token never learns whether its payload parsed.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<ResetClaims, TokenError> {
        let (signing_input, signature_b64) = token.rsplit_once('.').ok_or(TokenError::Invalid)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Invalid)?;

        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Invalid)?;

        let (payload_b64, timestamp_b64) =
            signing_input.split_once('.').ok_or(TokenError::Invalid)?;

        let timestamp_bytes = URL_SAFE_NO_PAD
            .decode(timestamp_b64)
            .map_err(|_| TokenError::Invalid)?;
        let issued_at = i64::from_be_bytes(
            timestamp_bytes
                .try_into()
                .map_err(|_| TokenError::Invalid)?,
        );

        if now.saturating_sub(issued_at) > self.max_age_seconds {
            return Err(TokenError::Expired);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Invalid)?;
        serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)
    }

    fn sign(&self, signing_input: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(signing_input);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for ResetTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetTokenSigner")
            .field("key", &"<redacted>")
            .field("max_age_seconds", &self.max_age_seconds)
            .finish()
    }
}
