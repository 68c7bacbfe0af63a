//! Admin profile repository for `PostgreSQL`.
//!
//! Backs [`ProfileStore`] with `admin.admin_user` and the singleton
//! `admin.bootstrap` marker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use skinproof_core::{AdminUserId, Email, InviteId, Permission, Role};

use super::{ProfileChange, ProfileStore, RepositoryError, conflict_on_unique};
use crate::models::{AdminProfile, NewAdminProfile};

macro_rules! profile_columns {
    () => {
        "id, email, name, role, department, permissions, is_active, \
         created_at, updated_at, last_login_at, invited_by, invite_id"
    };
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` admin profile queries.
#[derive(Debug, sqlx::FromRow)]
struct AdminProfileRow {
    id: Uuid,
    email: String,
    name: String,
    role: Role,
    department: String,
    permissions: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
    invited_by: Option<Uuid>,
    invite_id: Option<i32>,
}

impl TryFrom<AdminProfileRow> for AdminProfile {
    type Error = RepositoryError;

    fn try_from(row: AdminProfileRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let permissions = row
            .permissions
            .iter()
            .map(|name| {
                Permission::from_name(name).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!("unknown permission: {name}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: AdminUserId::new(row.id),
            email,
            name: row.name,
            role: row.role,
            department: row.department,
            permissions,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login_at: row.last_login_at,
            invited_by: row.invited_by.map(AdminUserId::new),
            invite_id: row.invite_id.map(InviteId::new),
        })
    }
}

fn permission_names(permissions: &[Permission]) -> Vec<String> {
    permissions.iter().map(|p| p.as_str().to_owned()).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// `PostgreSQL` profile store.
#[derive(Debug, Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    /// Create a new profile store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn create(&self, profile: NewAdminProfile) -> Result<AdminProfile, RepositoryError> {
        let permissions = permission_names(&profile.permissions());

        let row = sqlx::query_as::<_, AdminProfileRow>(concat!(
            "INSERT INTO admin.admin_user \
             (id, email, name, role, department, permissions, invited_by, invite_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING ",
            profile_columns!()
        ))
        .bind(profile.id.get())
        .bind(profile.email.as_str())
        .bind(&profile.name)
        .bind(profile.role)
        .bind(&profile.department)
        .bind(&permissions)
        .bind(profile.invited_by.map(|id| id.get()))
        .bind(profile.invite_id.map(|id| id.get()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "a profile already exists for this email"))?;

        row.try_into()
    }

    async fn get_by_id(&self, id: AdminUserId) -> Result<Option<AdminProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminProfileRow>(concat!(
            "SELECT ",
            profile_columns!(),
            " FROM admin.admin_user WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<AdminProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminProfileRow>(concat!(
            "SELECT ",
            profile_columns!(),
            " FROM admin.admin_user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_all(&self) -> Result<Vec<AdminProfile>, RepositoryError> {
        let rows = sqlx::query_as::<_, AdminProfileRow>(concat!(
            "SELECT ",
            profile_columns!(),
            " FROM admin.admin_user ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_privileged(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM admin.admin_user WHERE role IN ('support', 'admin', 'super_admin')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn apply_as_super_admin(
        &self,
        actor: AdminUserId,
        target: AdminUserId,
        change: ProfileChange,
    ) -> Result<Option<AdminProfile>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock every active super admin so concurrent changes queue here and
        // see each other's demotions.
        let super_admins: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM admin.admin_user \
             WHERE role = 'super_admin' AND is_active \
             ORDER BY id \
             FOR UPDATE",
        )
        .fetch_all(&mut *tx)
        .await?;
        if !super_admins.contains(&actor.get()) {
            return Ok(None);
        }

        let row = match change {
            ProfileChange::Role(role) => {
                sqlx::query_as::<_, AdminProfileRow>(concat!(
                    "UPDATE admin.admin_user \
                     SET role = $2, permissions = $3, updated_at = NOW() \
                     WHERE id = $1 \
                     RETURNING ",
                    profile_columns!()
                ))
                .bind(target.get())
                .bind(role)
                .bind(permission_names(role.default_permissions()))
                .fetch_optional(&mut *tx)
                .await?
            }
            ProfileChange::Active(active) => {
                sqlx::query_as::<_, AdminProfileRow>(concat!(
                    "UPDATE admin.admin_user \
                     SET is_active = $2, updated_at = NOW() \
                     WHERE id = $1 \
                     RETURNING ",
                    profile_columns!()
                ))
                .bind(target.get())
                .bind(active)
                .fetch_optional(&mut *tx)
                .await?
            }
        }
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        row.try_into().map(Some)
    }

    async fn record_login(
        &self,
        id: AdminUserId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE admin.admin_user SET last_login_at = $2 WHERE id = $1")
            .bind(id.get())
            .bind(at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn bootstrap_claimed(&self) -> Result<bool, RepositoryError> {
        let claimed: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admin.bootstrap)")
            .fetch_one(&self.pool)
            .await?;

        Ok(claimed)
    }

    async fn claim_bootstrap(&self, id: AdminUserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO admin.bootstrap (singleton, claimed_by) VALUES (TRUE, $1) \
             ON CONFLICT (singleton) DO NOTHING",
        )
        .bind(id.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_bootstrap(&self, id: AdminUserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM admin.bootstrap WHERE claimed_by = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
