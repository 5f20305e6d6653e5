//! Sessions and credentials
//!
//! Argon2id for stored password hashes, HS256 JWTs for the session
//! tokens handed back by register and login.

pub mod jwt;

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

use crate::error::AtelierError;

pub use jwt::{extract_token_from_header, Claims, JwtKeys};

/// Hash a password for storage. The PHC string carries the salt and
/// parameters, so nothing else needs to be persisted alongside it.
pub fn hash_password(password: &str) -> Result<String, AtelierError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AtelierError::Auth(format!("Password hashing failed: {e}")))
}

/// Check a password against a stored hash. A mismatch is `Ok(false)`; a
/// hash that does not parse is an error, since that means the stored row
/// is corrupt rather than the caller being wrong.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AtelierError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| AtelierError::Auth(format!("Stored password hash is malformed: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_lifecycle() {
        // The shape register/login go through: hash at signup, verify at
        // login, case and whitespace both significant.
        let stored = hash_password("north sea light").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("north sea light", &stored).unwrap());
        assert!(!verify_password("North Sea Light", &stored).unwrap());
        assert!(!verify_password("north sea light ", &stored).unwrap());
    }

    #[test]
    fn reused_password_produces_unlinkable_hashes() {
        let a = hash_password("shared-secret").unwrap();
        let b = hash_password("shared-secret").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("shared-secret", &a).unwrap());
        assert!(verify_password("shared-secret", &b).unwrap());
    }

    #[test]
    fn corrupt_stored_hash_is_an_error_not_a_mismatch() {
        let result = verify_password("anything", "argon2-but-not-really");
        assert!(matches!(result, Err(AtelierError::Auth(_))));
    }
}
