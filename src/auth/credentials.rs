//! Argon2id password hashing.
//!
//! The PHC string and its salt are stored side by side. Verification recomputes
//! the hash with the stored salt and compares in constant time; a salt column
//! that disagrees with the PHC string fails closed.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hashed password plus the salt it was derived with.
pub struct Credential {
    pub hash: String,
    pub salt: String,
}

/// Hash a plaintext password with a fresh random salt.
///
/// # Errors
/// Returns an error if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<Credential> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?
        .to_string();

    Ok(Credential {
        hash,
        salt: salt.as_str().to_string(),
    })
}

/// Check a plaintext password against a stored hash and salt.
#[must_use]
pub fn verify_password(password: &str, hash: &str, salt: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };

    if parsed.salt.map(|s| s.as_str()) != Some(salt) {
        return false;
    }

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
