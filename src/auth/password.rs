/// Password Hashing and Verification
///
/// bcrypt hashing with a configurable cost. Verification against an unknown
/// user still runs a full bcrypt comparison against a dummy hash so failed
/// logins take the same time whether or not the email exists.

use bcrypt::{hash, verify};

use crate::error::{AppError, ConfigError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const DUMMY_PASSWORD: &str = "cheapskate-timing-equaliser";

#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Build a hasher for the given bcrypt cost
    ///
    /// # Errors
    /// Returns a configuration error if bcrypt rejects the cost.
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let dummy_hash = hash(DUMMY_PASSWORD, cost).map_err(|e| {
            AppError::Config(ConfigError::InvalidValue(format!("bcrypt cost {}: {}", cost, e)))
        })?;
        Ok(Self { cost, dummy_hash })
    }

    /// Hash a password after checking its length
    ///
    /// # Errors
    /// - Validation error if the password is shorter than 8 or longer than 128 characters
    /// - Internal error if bcrypt fails
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        validate_password_length(password)?;

        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a stored hash, or against the dummy hash
    /// when there is no user. The dummy comparison always yields `false`.
    pub fn verify(&self, password: &str, stored_hash: Option<&str>) -> Result<bool, AppError> {
        match stored_hash {
            Some(stored) => verify(password, stored)
                .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e))),
            None => {
                let _ = verify(password, &self.dummy_hash);
                Ok(false)
            }
        }
    }
}

/// Only length is enforced; composition rules are left to the user.
fn validate_password_length(password: &str) -> Result<(), AppError> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        )));
    }

    // bcrypt ignores everything past 72 bytes anyway
    if length > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // lowest cost bcrypt accepts
    const TEST_COST: u32 = 4;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(TEST_COST).expect("Failed to build hasher")
    }

    #[test]
    fn test_hash_password() {
        let password = "longenough1";
        let hash = hasher().hash(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let hasher = hasher();
        let hash = hasher.hash("longenough1").unwrap();

        assert!(hasher.verify("longenough1", Some(&hash)).unwrap());
        assert!(!hasher.verify("wrongpassword", Some(&hash)).unwrap());
    }

    #[test]
    fn test_unknown_user_never_verifies() {
        let hasher = hasher();

        assert!(!hasher.verify(DUMMY_PASSWORD, None).unwrap());
        assert!(!hasher.verify("anything-at-all", None).unwrap());
    }

    #[test]
    fn test_too_short_password() {
        assert!(matches!(
            hasher().hash("short1"),
            Err(AppError::Validation(ValidationError::TooShort(_, 8)))
        ));
    }

    #[test]
    fn test_too_long_password() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1);
        assert!(matches!(
            hasher().hash(&long_password),
            Err(AppError::Validation(ValidationError::TooLong(_, _)))
        ));
    }

    #[test]
    fn test_no_composition_rules() {
        assert!(hasher().hash("alllowercase").is_ok());
        assert!(hasher().hash("12345678").is_ok());
    }

    #[test]
    fn test_invalid_cost() {
        assert!(PasswordHasher::new(2).is_err());
    }
}
