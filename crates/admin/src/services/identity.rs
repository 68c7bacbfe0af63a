//! Identity provider: the accounts admin profiles sign in with.
//!
//! Accounts hold an email and an Argon2id password hash. The profile that
//! carries role and department lives separately in the profile store and
//! shares the account's ID.

use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use skinproof_core::{AdminUserId, Email};

use crate::db::{RepositoryError, conflict_on_unique};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors raised by an [`IdentityProvider`].
#[derive(Debug, Error)]
pub enum IdentityError {
    /// An account already exists for the email.
    #[error("an account with this email already exists")]
    EmailTaken,

    /// Password does not meet requirements.
    #[error("{0}")]
    WeakPassword(String),

    /// Unknown email or wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Hashing failed.
    #[error("failed to hash password")]
    PasswordHash,

    /// Account does not exist.
    #[error("account not found")]
    NotFound,

    /// Storage failure.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// An identity account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAccount {
    /// Account ID, reused as the profile ID.
    pub id: AdminUserId,
    /// Sign-in email.
    pub email: Email,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Creates, verifies and removes sign-in accounts.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Create an account for `email` with `password`.
    async fn create_account(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<IdentityAccount, IdentityError>;

    /// Check `password` against the account for `email`.
    async fn verify_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<IdentityAccount, IdentityError>;

    /// Remove an account.
    async fn delete_account(&self, id: AdminUserId) -> Result<(), IdentityError>;
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `IdentityError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), IdentityError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| IdentityError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_hash(password: &str, hash: &str) -> Result<(), IdentityError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| IdentityError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| IdentityError::InvalidCredentials)
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl IdentityRow {
    fn into_account(self) -> Result<(IdentityAccount, String), IdentityError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok((
            IdentityAccount {
                id: AdminUserId::new(self.id),
                email,
                created_at: self.created_at,
            },
            self.password_hash,
        ))
    }
}

/// Identity provider backed by `admin.identity`.
#[derive(Debug, Clone)]
pub struct PgIdentityProvider {
    pool: PgPool,
}

impl PgIdentityProvider {
    /// Create a new provider.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn create_account(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<IdentityAccount, IdentityError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let row = sqlx::query_as::<_, IdentityRow>(
            "INSERT INTO admin.identity (id, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING id, email, password_hash, created_at",
        )
        .bind(AdminUserId::generate().get())
        .bind(email.as_str())
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match conflict_on_unique(e, "email taken") {
            RepositoryError::Conflict(_) => IdentityError::EmailTaken,
            other => IdentityError::Repository(other),
        })?;

        Ok(row.into_account()?.0)
    }

    async fn verify_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<IdentityAccount, IdentityError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, password_hash, created_at FROM admin.identity WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or(IdentityError::InvalidCredentials)?;

        let (account, hash) = row.into_account()?;
        verify_hash(password, &hash)?;
        Ok(account)
    }

    async fn delete_account(&self, id: AdminUserId) -> Result<(), IdentityError> {
        let result = sqlx::query("DELETE FROM admin.identity WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// In-memory identity provider for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityProvider {
    accounts: Arc<Mutex<HashMap<AdminUserId, (IdentityAccount, String)>>>,
}

impl MemoryIdentityProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an account exists for `email`.
    pub async fn contains(&self, email: &Email) -> bool {
        self.accounts
            .lock()
            .await
            .values()
            .any(|(account, _)| &account.email == email)
    }

    /// Number of accounts.
    pub async fn len(&self) -> usize {
        self.accounts.lock().await.len()
    }

    /// Whether there are no accounts.
    pub async fn is_empty(&self) -> bool {
        self.accounts.lock().await.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_account(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<IdentityAccount, IdentityError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let mut accounts = self.accounts.lock().await;
        if accounts.values().any(|(account, _)| &account.email == email) {
            return Err(IdentityError::EmailTaken);
        }

        let account = IdentityAccount {
            id: AdminUserId::generate(),
            email: email.clone(),
            created_at: Utc::now(),
        };
        accounts.insert(account.id, (account.clone(), password_hash));
        Ok(account)
    }

    async fn verify_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<IdentityAccount, IdentityError> {
        let (account, hash) = self
            .accounts
            .lock()
            .await
            .values()
            .find(|(account, _)| &account.email == email)
            .cloned()
            .ok_or(IdentityError::InvalidCredentials)?;

        verify_hash(password, &hash)?;
        Ok(account)
    }

    async fn delete_account(&self, id: AdminUserId) -> Result<(), IdentityError> {
        self.accounts
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(IdentityError::NotFound)
    }
}
