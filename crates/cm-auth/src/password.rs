//! Password hashing and policy

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash string
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

const TEMPORARY_PASSWORD_LENGTH: usize = 12;
// No 0/O or 1/l/I, the password is read off a screen
const LETTERS: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";

/// Generate a temporary password containing letters and at least two digits
pub fn generate_temporary_password() -> String {
    let mut rng = rand::rng();
    let mut chars: Vec<char> = (0..TEMPORARY_PASSWORD_LENGTH)
        .map(|i| {
            let set = if i < 2 { DIGITS } else { LETTERS };
            set[rng.random_range(0..set.len())] as char
        })
        .collect();

    // Move the digits away from the front
    for i in (1..chars.len()).rev() {
        let j = rng.random_range(0..=i);
        chars.swap(i, j);
    }
    chars.into_iter().collect()
}

/// Rules a new password must satisfy
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}

impl PasswordPolicy {
    pub fn with_min_length(min_length: usize) -> Self {
        Self {
            min_length,
            ..Default::default()
        }
    }

    /// Every violated rule, as attribute messages for `password`
    pub fn violations(&self, password: &str) -> Vec<String> {
        let mut messages = Vec::new();
        let length = password.chars().count();

        if length < self.min_length {
            messages.push(format!(
                "is too short (minimum is {} characters)",
                self.min_length
            ));
        }
        if length > self.max_length {
            messages.push(format!(
                "is too long (maximum is {} characters)",
                self.max_length
            ));
        }
        if !password.chars().any(char::is_alphabetic) {
            messages.push("must contain a letter".to_string());
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            messages.push("must contain a digit".to_string());
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse 42").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse 42", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_temporary_password_satisfies_policy() {
        let policy = PasswordPolicy::default();
        for _ in 0..20 {
            let password = generate_temporary_password();
            assert_eq!(password.len(), TEMPORARY_PASSWORD_LENGTH);
            assert!(policy.violations(&password).is_empty(), "{}", password);
        }
    }

    #[test]
    fn test_policy_violations() {
        let policy = PasswordPolicy::with_min_length(10);
        let violations = policy.violations("short");
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("minimum is 10"));
        assert!(policy.violations("longenough1").is_empty());
    }
}
