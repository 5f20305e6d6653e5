//! JWT session tokens
//!
//! HS256 tokens carrying the account id; lifetime comes from the
//! configured expiry.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AtelierError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    /// Expiry (unix seconds)
    pub exp: u64,
    /// Issued at (unix seconds)
    pub iat: u64,
}

/// Signing and verification keys derived from the configured secret.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_seconds: u64,
}

impl JwtKeys {
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    pub fn issue(&self, account_id: &str) -> Result<(String, u64), AtelierError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let expires_at = now + self.expiry_seconds;
        let claims = Claims {
            sub: account_id.to_string(),
            exp: expires_at,
            iat: now,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AtelierError::Auth(format!("Failed to sign token: {e}")))?;
        Ok((token, expires_at))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AtelierError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AtelierError::Unauthorized(format!("Invalid token: {e}")))
    }
}

/// Pull the bearer token out of an Authorization header value.
pub fn extract_token_from_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_validate() {
        let keys = JwtKeys::new("a-secret-long-enough-for-testing", 3600);
        let (token, expires_at) = keys.issue("acct-1").unwrap();
        assert!(expires_at > chrono::Utc::now().timestamp() as u64);

        let claims = keys.validate(&token).unwrap();
        assert_eq!(claims.sub, "acct-1");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let keys = JwtKeys::new("a-secret-long-enough-for-testing", 3600);
        let other = JwtKeys::new("a-different-secret-entirely-here", 3600);
        let (token, _) = keys.issue("acct-1").unwrap();
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(extract_token_from_header("bearer abc"), Some("abc"));
        assert_eq!(extract_token_from_header("Basic abc"), None);
        assert_eq!(extract_token_from_header("Bearer "), None);
    }
}
