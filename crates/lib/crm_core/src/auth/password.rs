//! Password hashing via bcrypt.

use tracing::debug;

use super::AuthError;

/// bcrypt cost factor.
pub const BCRYPT_COST: u32 = 12;

/// Salted one-way hashing of plaintext credentials.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password. The random salt is embedded in the output.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
    }

    /// Verify a password against a bcrypt hash. A malformed hash counts as a
    /// mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match bcrypt::verify(password, hash) {
            Ok(ok) => ok,
            Err(e) => {
                debug!(error = %e, "bcrypt verify failed on stored hash");
                false
            }
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(BCRYPT_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[test]
    fn default_cost_is_twelve() {
        assert_eq!(PasswordHasher::default().cost, 12);
    }

    #[test]
    fn hash_then_verify() {
        let hasher = fast();
        let hash = hasher.hash("pw123").unwrap();
        assert_ne!(hash, "pw123");
        assert!(hasher.verify("pw123", &hash));
        assert!(!hasher.verify("pw124", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = fast();
        let a = hasher.hash("secret").unwrap();
        let b = hasher.hash("secret").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("secret", &a));
        assert!(hasher.verify("secret", &b));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        let hasher = fast();
        assert!(!hasher.verify("pw", "not-a-bcrypt-hash"));
        assert!(!hasher.verify("pw", ""));
    }
}
