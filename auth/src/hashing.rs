use crate::errors::{AuthError, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use lazy_static::lazy_static;

lazy_static! {
    /// Stand-in hash checked for unknown users so they cost the same as known ones.
    static ref DUMMY_HASH: Option<String> = hash_password("sos-auth-unknown-user").ok();
}

/// Hashes a password into an argon2 PHC string with a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Verifies against the stored hash, or burns one verification on a stand-in
/// hash when the user does not exist. Unknown users never match.
pub fn verify_stored(password: &str, stored_hash: Option<&str>) -> bool {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn plaintext_in_store_never_matches() {
        assert!(!verify_password("secret", "secret"));
    }

    #[test]
    fn unknown_user_still_runs_a_verification() {
        let dummy = DUMMY_HASH.as_deref().unwrap();
        assert!(PasswordHash::new(dummy).is_ok());
        assert!(!verify_stored("sos-auth-unknown-user", None));
        assert!(!verify_stored("anything", None));
    }

    #[test]
    fn known_user_is_checked_against_stored_hash() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_stored("hunter2", Some(&hash)));
        assert!(!verify_stored("hunter3", Some(&hash)));
    }
}
