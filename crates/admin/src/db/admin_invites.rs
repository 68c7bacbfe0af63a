//! Invite token repository for `PostgreSQL`.
//!
//! Backs [`InviteStore`] with the `admin.invite_token` table. A partial
//! unique index on `email WHERE is_active` keeps one active invite per email.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use skinproof_core::{AdminUserId, Email, InviteId, InviteToken, Role};

use super::{InviteStore, RepositoryError, conflict_on_unique};

macro_rules! invite_columns {
    () => {
        "id, token, email, role, department, invited_by, invited_by_email, \
         created_at, expires_at, used_at, used_by, is_active, max_uses, current_uses"
    };
}

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct InviteRow {
    id: i32,
    token: String,
    email: String,
    role: Role,
    department: String,
    invited_by: Option<Uuid>,
    invited_by_email: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    used_by: Option<Uuid>,
    is_active: bool,
    max_uses: i32,
    current_uses: i32,
}

impl TryFrom<InviteRow> for InviteToken {
    type Error = RepositoryError;

    fn try_from(row: InviteRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let invited_by_email = row
            .invited_by_email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid creator email in database: {e}"))
            })?;

        Ok(Self {
            id: Some(InviteId::new(row.id)),
            token: row.token,
            email,
            role: row.role,
            department: row.department,
            invited_by: row.invited_by.map(AdminUserId::new),
            invited_by_email,
            created_at: row.created_at,
            expires_at: row.expires_at,
            used_at: row.used_at,
            used_by: row.used_by.map(AdminUserId::new),
            is_active: row.is_active,
            max_uses: row.max_uses,
            current_uses: row.current_uses,
        })
    }
}

/// `PostgreSQL` invite store.
#[derive(Debug, Clone)]
pub struct PgInviteStore {
    pool: PgPool,
}

impl PgInviteStore {
    /// Create a new invite store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InviteStore for PgInviteStore {
    async fn insert(&self, invite: InviteToken) -> Result<InviteToken, RepositoryError> {
        let row = sqlx::query_as::<_, InviteRow>(concat!(
            "INSERT INTO admin.invite_token \
             (token, email, role, department, invited_by, invited_by_email, \
              created_at, expires_at, is_active, max_uses, current_uses) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING ",
            invite_columns!()
        ))
        .bind(&invite.token)
        .bind(invite.email.as_str())
        .bind(invite.role)
        .bind(&invite.department)
        .bind(invite.invited_by.map(|id| id.get()))
        .bind(invite.invited_by_email.as_ref().map(Email::as_str))
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .bind(invite.is_active)
        .bind(invite.max_uses)
        .bind(invite.current_uses)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "an active invite already exists for this email"))?;

        row.try_into()
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<InviteToken>, RepositoryError> {
        let row = sqlx::query_as::<_, InviteRow>(concat!(
            "SELECT ",
            invite_columns!(),
            " FROM admin.invite_token WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_id(&self, id: InviteId) -> Result<Option<InviteToken>, RepositoryError> {
        let row = sqlx::query_as::<_, InviteRow>(concat!(
            "SELECT ",
            invite_columns!(),
            " FROM admin.invite_token WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_active_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<InviteToken>, RepositoryError> {
        let row = sqlx::query_as::<_, InviteRow>(concat!(
            "SELECT ",
            invite_columns!(),
            " FROM admin.invite_token WHERE email = $1 AND is_active"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_by_creator(
        &self,
        creator: AdminUserId,
    ) -> Result<Vec<InviteToken>, RepositoryError> {
        let rows = sqlx::query_as::<_, InviteRow>(concat!(
            "SELECT ",
            invite_columns!(),
            " FROM admin.invite_token WHERE invited_by = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(creator.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_all(&self) -> Result<Vec<InviteToken>, RepositoryError> {
        let rows = sqlx::query_as::<_, InviteRow>(concat!(
            "SELECT ",
            invite_columns!(),
            " FROM admin.invite_token ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn deactivate(&self, id: InviteId) -> Result<InviteToken, RepositoryError> {
        let row = sqlx::query_as::<_, InviteRow>(concat!(
            "UPDATE admin.invite_token SET is_active = FALSE WHERE id = $1 RETURNING ",
            invite_columns!()
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn consume(
        &self,
        token: &str,
        consumer: AdminUserId,
        now: DateTime<Utc>,
    ) -> Result<Option<InviteToken>, RepositoryError> {
        // SET expressions see the pre-update row.
        let row = sqlx::query_as::<_, InviteRow>(concat!(
            "UPDATE admin.invite_token \
             SET current_uses = current_uses + 1, \
                 used_at = $3, \
                 used_by = $2, \
                 is_active = (current_uses + 1 < max_uses) \
             WHERE token = $1 \
               AND is_active \
               AND current_uses < max_uses \
               AND expires_at > $3 \
             RETURNING ",
            invite_columns!()
        ))
        .bind(token)
        .bind(consumer.get())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}
