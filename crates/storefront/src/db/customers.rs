//! Customer accounts created during checkout.

use sqlx::PgPool;

use larkspur_core::{CustomerId, Email};

use super::{RepositoryError, conflict_on_unique};
use crate::store::CustomerDirectory;

/// `PostgreSQL`-backed [`CustomerDirectory`].
#[derive(Clone)]
pub struct PgCustomerDirectory {
    pool: PgPool,
}

impl PgCustomerDirectory {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CustomerDirectory for PgCustomerDirectory {
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    async fn create(
        &self,
        email: &Email,
        name: &str,
        password_hash: &str,
    ) -> Result<CustomerId, RepositoryError> {
        let id: CustomerId = sqlx::query_scalar(
            r"
            INSERT INTO storefront.customer (id, email, name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(CustomerId::new())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;

        Ok(id)
    }
}
