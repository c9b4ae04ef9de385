//! Database repository for users.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        permissions::PermissionDBResponse,
        users::{ProfileFields, UserAuthContext, UserCreateDBRequest, UserDBResponse, UserStatus, UserUpdateDBRequest},
    },
};
use crate::types::{RoleId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

const USER_SELECT: &str = r#"
    SELECT
        u.id, u.name, u.email, u.phone, u.password_hash, u.role_id,
        r.name AS role_name, r.display_name AS role_display_name,
        u.status, u.email_verified, u.last_login, u.password_changed_at, u.created_at, u.updated_at,
        up.department, up.position, up.bio,
        (SELECT COUNT(*) FROM leads l WHERE l.responsible_id = u.id) AS leads_assigned,
        (SELECT COUNT(*) FROM interactions i WHERE i.user_id = u.id) AS interaction_count
    FROM users u
    LEFT JOIN roles r ON u.role_id = r.id
    LEFT JOIN user_profiles up ON up.user_id = u.id
"#;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role_id: Option<RoleId>,
    pub role_name: Option<String>,
    pub role_display_name: Option<String>,
    pub status: UserStatus,
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub leads_assigned: i64,
    pub interaction_count: i64,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            role_id: user.role_id,
            role_name: user.role_name,
            role_display_name: user.role_display_name,
            status: user.status,
            email_verified: user.email_verified,
            last_login: user.last_login,
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
            profile: ProfileFields {
                department: user.department,
                position: user.position,
                bio: user.bio,
            },
            leads_assigned: user.leads_assigned,
            interaction_count: user.interaction_count,
        }
    }
}

#[derive(Debug, FromRow)]
struct AuthRow {
    id: UserId,
    email: String,
    name: String,
    role_name: Option<String>,
    role_display_name: Option<String>,
    permissions: Vec<String>,
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user_id = Uuid::new_v4();

        // User and profile go in together
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, password_hash, role_id, status, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user_id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.password_hash)
        .bind(request.role_id)
        .bind(request.status)
        .bind(request.email_verified)
        .execute(&mut *tx)
        .await?;

        if !request.profile.is_empty() {
            sqlx::query("INSERT INTO user_profiles (user_id, department, position, bio) VALUES ($1, $2, $3, $4)")
                .bind(user_id)
                .bind(&request.profile.department)
                .bind(&request.profile.position)
                .bind(&request.profile.bio)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get_by_id(user_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>(&format!("{USER_SELECT} ORDER BY u.created_at DESC LIMIT $1 OFFSET $2"))
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(UserDBResponse::from).collect())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // This update touches multiple tables, so regardless of the connection passed in, we still need a transaction.
        {
            let mut tx = self.db.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE users SET
                    name = COALESCE($2, name),
                    email = COALESCE($3, email),
                    phone = COALESCE($4, phone),
                    password_hash = COALESCE($5, password_hash),
                    password_changed_at = CASE WHEN $5::text IS NULL THEN password_changed_at ELSE NOW() END,
                    role_id = COALESCE($6, role_id),
                    status = COALESCE($7, status),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&request.name)
            .bind(&request.email)
            .bind(&request.phone)
            .bind(&request.password_hash)
            .bind(request.role_id)
            .bind(request.status)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(DbError::NotFound);
            }

            if !request.profile.is_empty() {
                sqlx::query(
                    r#"
                    INSERT INTO user_profiles (user_id, department, position, bio)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (user_id) DO UPDATE SET
                        department = COALESCE(EXCLUDED.department, user_profiles.department),
                        position = COALESCE(EXCLUDED.position, user_profiles.position),
                        bio = COALESCE(EXCLUDED.bio, user_profiles.bio),
                        updated_at = NOW()
                    "#,
                )
                .bind(id)
                .bind(&request.profile.department)
                .bind(&request.profile.position)
                .bind(&request.profile.bio)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Case-insensitive lookup, regardless of status
    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE LOWER(u.email) = LOWER($1)"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    /// Whether another account already uses this email
    #[instrument(skip(self, email), err)]
    pub async fn email_taken(&mut self, email: &str, except: Option<UserId>) -> Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(taken)
    }

    /// Identity, role and permission union for an ACTIVE user. `None` when the user is missing
    /// or not ACTIVE.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn get_auth_context(&mut self, id: UserId) -> Result<Option<UserAuthContext>> {
        let row = sqlx::query_as::<_, AuthRow>(
            r#"
            SELECT
                u.id, u.email, u.name,
                r.name AS role_name,
                r.display_name AS role_display_name,
                COALESCE(
                    ARRAY_AGG(DISTINCT p.name::text) FILTER (WHERE p.name IS NOT NULL),
                    ARRAY[]::text[]
                ) AS permissions
            FROM users u
            LEFT JOIN roles r ON u.role_id = r.id AND r.is_active = TRUE
            LEFT JOIN role_permissions rp ON r.id = rp.role_id
            LEFT JOIN permissions p ON rp.permission_id = p.id
            WHERE u.id = $1 AND u.status = 'ACTIVE'
            GROUP BY u.id, u.email, u.name, r.name, r.display_name
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row.map(|r| UserAuthContext {
            id: r.id,
            email: r.email,
            name: r.name,
            role_name: r.role_name,
            role_display_name: r.role_display_name,
            permissions: r.permissions,
        }))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn record_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Permission details granted through the user's role. Empty for inactive users or roles.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn permissions_for(&mut self, id: UserId) -> Result<Vec<PermissionDBResponse>> {
        let permissions = sqlx::query_as::<_, PermissionDBResponse>(
            r#"
            SELECT p.id, p.name, p.module, p.action, p.display_name, p.description, p.created_at
            FROM users u
            JOIN roles r ON u.role_id = r.id
            JOIN role_permissions rp ON r.id = rp.role_id
            JOIN permissions p ON rp.permission_id = p.id
            WHERE u.id = $1 AND u.status = 'ACTIVE' AND r.is_active = TRUE
            ORDER BY p.module, p.action
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(permissions)
    }

    /// Idempotent bootstrap: create the account or rotate its password, and make sure it holds
    /// the given role and is ACTIVE.
    #[instrument(skip(self, email, password_hash), err)]
    pub async fn upsert_bootstrap_admin(&mut self, email: &str, password_hash: &str, role_id: RoleId) -> Result<UserId> {
        let id = sqlx::query_scalar::<_, UserId>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role_id, status, email_verified)
            VALUES ($1, 'Administrator', $2, $3, $4, 'ACTIVE', TRUE)
            ON CONFLICT (email) DO UPDATE SET
                password_hash = EXCLUDED.password_hash,
                password_changed_at = NOW(),
                role_id = EXCLUDED.role_id,
                status = 'ACTIVE',
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(role_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Roles;
    use sqlx::PgPool;

    async fn role_id(conn: &mut PgConnection, name: &str) -> RoleId {
        Roles::new(conn).get_by_name(name).await.unwrap().unwrap().id
    }

    fn create_request(email: &str, role_id: Option<RoleId>) -> UserCreateDBRequest {
        UserCreateDBRequest {
            name: "Test User".to_string(),
            email: email.to_string(),
            phone: Some("+34600111222".to_string()),
            password_hash: Some("$argon2id$v=19$m=128,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2g".to_string()),
            role_id,
            status: UserStatus::Active,
            email_verified: true,
            profile: ProfileFields {
                department: Some("Sales".to_string()),
                position: None,
                bio: None,
            },
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_with_profile(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let rep_role = role_id(&mut conn, "sales_rep").await;
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&create_request("rep@crm.com", Some(rep_role))).await.unwrap();

        assert_eq!(user.email, "rep@crm.com");
        assert_eq!(user.role_name.as_deref(), Some("sales_rep"));
        assert_eq!(user.role_display_name.as_deref(), Some("Sales Representative"));
        assert_eq!(user.profile.department.as_deref(), Some("Sales"));
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.leads_assigned, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&create_request("dup@crm.com", None)).await.unwrap();
        let err = repo.create(&create_request("dup@crm.com", None)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        assert!(repo.email_taken("DUP@crm.com", None).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_sets_password_changed_at_and_upserts_profile(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let user = repo.create(&create_request("update@crm.com", None)).await.unwrap();
        assert!(user.password_changed_at.is_none());

        let updated = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    name: Some("Renamed".to_string()),
                    password_hash: Some("$argon2id$new".to_string()),
                    profile: ProfileFields {
                        position: Some("Lead".to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Renamed");
        assert!(updated.password_changed_at.is_some());
        // Existing department is kept, position added
        assert_eq!(updated.profile.department.as_deref(), Some("Sales"));
        assert_eq!(updated.profile.position.as_deref(), Some("Lead"));

        let missing = repo.update(Uuid::new_v4(), &UserUpdateDBRequest::default()).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_auth_context_unions_role_permissions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let viewer_role = role_id(&mut conn, "viewer").await;
        let mut repo = Users::new(&mut conn);
        let user = repo.create(&create_request("viewer@crm.com", Some(viewer_role))).await.unwrap();

        let ctx = repo.get_auth_context(user.id).await.unwrap().unwrap();
        let mut permissions = ctx.permissions.clone();
        permissions.sort();
        assert_eq!(permissions, vec!["analytics.read", "interactions.read", "leads.read"]);
        assert_eq!(ctx.role_name.as_deref(), Some("viewer"));

        // Inactive users do not resolve
        repo.update(
            user.id,
            &UserUpdateDBRequest {
                status: Some(UserStatus::Suspended),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(repo.get_auth_context(user.id).await.unwrap().is_none());
        assert!(repo.permissions_for(user.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_auth_context_without_role_has_no_permissions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let user = repo.create(&create_request("norole@crm.com", None)).await.unwrap();

        let ctx = repo.get_auth_context(user.id).await.unwrap().unwrap();
        assert!(ctx.role_name.is_none());
        assert!(ctx.permissions.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_bootstrap_admin_is_idempotent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let super_admin = role_id(&mut conn, "super_admin").await;
        let mut repo = Users::new(&mut conn);

        let first = repo.upsert_bootstrap_admin("admin@crm.com", "$argon2id$one", super_admin).await.unwrap();
        let second = repo.upsert_bootstrap_admin("admin@crm.com", "$argon2id$two", super_admin).await.unwrap();
        assert_eq!(first, second);

        let admin = repo.get_user_by_email("ADMIN@crm.com").await.unwrap().unwrap();
        assert_eq!(admin.password_hash.as_deref(), Some("$argon2id$two"));
        assert_eq!(admin.role_name.as_deref(), Some("super_admin"));
        assert!(admin.password_changed_at.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_record_login_and_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let user = repo.create(&create_request("login@crm.com", None)).await.unwrap();
        assert!(user.last_login.is_none());

        repo.record_login(user.id).await.unwrap();
        assert!(repo.get_by_id(user.id).await.unwrap().unwrap().last_login.is_some());

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
    }
}
