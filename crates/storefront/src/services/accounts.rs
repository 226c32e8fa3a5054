//! Inline account creation at checkout.
//!
//! A shopper can ask for an account while checking out. The account is
//! created before any payment is attempted, so a failure here is an ordinary
//! recoverable checkout error.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;
use tracing::{info, instrument};

use larkspur_core::{CustomerId, Email};

use crate::db::RepositoryError;
use crate::store::CustomerDirectory;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Errors from account creation.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("an account with this email already exists")]
    AlreadyExists,

    #[error("password validation failed: {0}")]
    WeakPassword(String),

    #[error("password hashing error")]
    PasswordHash,

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AccountError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(_) => Self::AlreadyExists,
            other => Self::Repository(other),
        }
    }
}

/// Create an account for `email` and return its id.
///
/// # Errors
///
/// Returns `AccountError::WeakPassword` before touching the directory if the
/// password is unacceptable, and `AccountError::AlreadyExists` if the email is
/// registered.
#[instrument(skip(customers, password), fields(email = %email))]
pub async fn create_account<C: CustomerDirectory>(
    customers: &C,
    email: &Email,
    name: &str,
    password: &str,
) -> Result<CustomerId, AccountError> {
    validate_password(password)?;
    let hash = hash_password(password)?;
    let id = customers.create(email, name, &hash).await?;
    info!(customer_id = %id, "Account created at checkout");
    Ok(id)
}

fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AccountError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AccountError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AccountError::PasswordHash)
}

/// Verify a password against a stored hash.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCustomerDirectory;

    #[test]
    fn test_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not a hash"));
    }

    #[tokio::test]
    async fn test_short_password_rejected_before_write() {
        let customers = MemoryCustomerDirectory::default();
        let email = Email::parse("ada@example.com").unwrap();

        let err = create_account(&customers, &email, "Ada", "short").await;
        assert!(matches!(err, Err(AccountError::WeakPassword(_))));
        assert_eq!(customers.len(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_case_insensitive() {
        let customers = MemoryCustomerDirectory::default();
        let email = Email::parse("ada@example.com").unwrap();
        create_account(&customers, &email, "Ada", "long enough pw")
            .await
            .unwrap();

        let upper = Email::parse("ADA@example.com").unwrap();
        let err = create_account(&customers, &upper, "Ada", "long enough pw").await;
        assert!(matches!(err, Err(AccountError::AlreadyExists)));
    }
}
