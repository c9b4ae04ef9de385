//! Database repository for roles and their permission sets.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::roles::{RoleCreateDBRequest, RoleDBResponse, RolePermissionSummary, RoleUpdateDBRequest},
};
use crate::types::{RoleId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing roles
#[derive(Debug, Clone, Default)]
pub struct RoleFilter {
    /// Only return roles with `is_active = TRUE`
    pub active_only: bool,
}

impl RoleFilter {
    pub fn active() -> Self {
        Self { active_only: true }
    }
}

const ROLE_SELECT: &str = r#"
    SELECT
        r.id, r.name, r.display_name, r.description, r.is_active, r.created_at, r.updated_at,
        (SELECT COUNT(*) FROM users u WHERE u.role_id = r.id) AS user_count
    FROM roles r
"#;

#[derive(Debug, Clone, FromRow)]
struct Role {
    pub id: RoleId,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_count: i64,
}

impl Role {
    fn into_response(self, permissions: Vec<RolePermissionSummary>) -> RoleDBResponse {
        RoleDBResponse {
            id: self.id,
            name: self.name,
            display_name: self.display_name,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            user_count: self.user_count,
            permissions,
        }
    }
}

#[derive(Debug, FromRow)]
struct RolePermissionRow {
    role_id: RoleId,
    name: String,
    display_name: String,
    module: String,
    action: String,
}

pub struct Roles<'c> {
    db: &'c mut PgConnection,
}

/// Swap the permission set of a role for the named permissions. Runs on the caller's transaction.
async fn replace_permissions_in(conn: &mut PgConnection, role_id: RoleId, permissions: &[String]) -> Result<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *conn)
        .await?;

    if !permissions.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, p.id FROM permissions p WHERE p.name = ANY($2)
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permissions)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl<'c> Repository for Roles<'c> {
    type CreateRequest = RoleCreateDBRequest;
    type UpdateRequest = RoleUpdateDBRequest;
    type Response = RoleDBResponse;
    type Id = RoleId;
    type Filter = RoleFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let role_id = Uuid::new_v4();
        let mut tx = self.db.begin().await?;

        sqlx::query("INSERT INTO roles (id, name, display_name, description) VALUES ($1, $2, $3, $4)")
            .bind(role_id)
            .bind(&request.name)
            .bind(&request.display_name)
            .bind(&request.description)
            .execute(&mut *tx)
            .await?;

        replace_permissions_in(&mut tx, role_id, &request.permissions).await?;

        tx.commit().await?;

        self.get_by_id(role_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let role = sqlx::query_as::<_, Role>(&format!("{ROLE_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match role {
            Some(role) => {
                let mut permissions = self.permissions_by_role(&[role.id]).await?;
                let summaries = permissions.remove(&role.id).unwrap_or_default();
                Ok(Some(role.into_response(summaries)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), fields(active_only = filter.active_only), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            "{ROLE_SELECT} WHERE ($1 = FALSE OR r.is_active = TRUE) ORDER BY r.created_at ASC, r.name ASC"
        ))
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;

        let ids: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
        let mut permissions = self.permissions_by_role(&ids).await?;

        Ok(roles
            .into_iter()
            .map(|role| {
                let summaries = permissions.remove(&role.id).unwrap_or_default();
                role.into_response(summaries)
            })
            .collect())
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        {
            let mut tx = self.db.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE roles SET
                    name = COALESCE($2, name),
                    display_name = COALESCE($3, display_name),
                    description = COALESCE($4, description),
                    is_active = COALESCE($5, is_active),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&request.name)
            .bind(&request.display_name)
            .bind(&request.description)
            .bind(request.is_active)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(DbError::NotFound);
            }

            if let Some(permissions) = &request.permissions {
                replace_permissions_in(&mut tx, id, permissions).await?;
            }

            tx.commit().await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Roles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<RoleDBResponse>> {
        let role = sqlx::query_as::<_, Role>(&format!("{ROLE_SELECT} WHERE r.name = $1"))
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        match role {
            Some(role) => {
                let mut permissions = self.permissions_by_role(&[role.id]).await?;
                let summaries = permissions.remove(&role.id).unwrap_or_default();
                Ok(Some(role.into_response(summaries)))
            }
            None => Ok(None),
        }
    }

    /// Number of users currently assigned to the role
    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    pub async fn user_count(&mut self, id: RoleId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Replace the role's permission set atomically. Unknown names are ignored, so callers should
    /// validate them first.
    #[instrument(skip(self, permissions), fields(role_id = %abbrev_uuid(&id), count = permissions.len()), err)]
    pub async fn replace_permissions(&mut self, id: RoleId, permissions: &[String]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        replace_permissions_in(&mut tx, id, permissions).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn permissions_by_role(&mut self, ids: &[RoleId]) -> Result<HashMap<RoleId, Vec<RolePermissionSummary>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT rp.role_id, p.name, p.display_name, p.module, p.action
            FROM role_permissions rp
            JOIN permissions p ON rp.permission_id = p.id
            WHERE rp.role_id = ANY($1)
            ORDER BY p.module, p.action, p.name
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut grouped: HashMap<RoleId, Vec<RolePermissionSummary>> = HashMap::new();
        for row in rows {
            grouped.entry(row.role_id).or_default().push(RolePermissionSummary {
                name: row.name,
                display_name: row.display_name,
                module: row.module,
                action: row.action,
            });
        }

        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Users;
    use sqlx::PgPool;

    fn names(role: &RoleDBResponse) -> Vec<&str> {
        let mut names: Vec<&str> = role.permissions.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        names
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_seeded_roles_are_listed_with_permissions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Roles::new(&mut conn);

        let roles = repo.list(&RoleFilter::active()).await.unwrap();
        let role_names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        for expected in ["super_admin", "admin", "manager", "sales_rep", "viewer"] {
            assert!(role_names.contains(&expected), "missing {expected}");
        }

        let admin = roles.iter().find(|r| r.name == "admin").unwrap();
        assert_eq!(admin.permissions.len(), 15);

        let viewer = roles.iter().find(|r| r.name == "viewer").unwrap();
        assert_eq!(names(viewer), vec!["analytics.read", "interactions.read", "leads.read"]);
        assert_eq!(viewer.user_count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_role_and_replace_permissions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Roles::new(&mut conn);

        let role = repo
            .create(&RoleCreateDBRequest {
                name: "support".to_string(),
                display_name: "Support".to_string(),
                description: None,
                permissions: vec!["leads.read".to_string(), "leads.read".to_string(), "users.read".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(names(&role), vec!["leads.read", "users.read"]);

        repo.replace_permissions(role.id, &["analytics.read".to_string()]).await.unwrap();
        let role = repo.get_by_id(role.id).await.unwrap().unwrap();
        assert_eq!(names(&role), vec!["analytics.read"]);

        let role = repo
            .update(
                role.id,
                &RoleUpdateDBRequest {
                    display_name: Some("Customer Support".to_string()),
                    permissions: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(role.display_name, "Customer Support");
        assert!(role.permissions.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_role_name_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Roles::new(&mut conn);

        let err = repo
            .create(&RoleCreateDBRequest {
                name: "viewer".to_string(),
                display_name: "Another viewer".to_string(),
                description: None,
                permissions: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_user_count_tracks_assignments(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let viewer = Roles::new(&mut conn).get_by_name("viewer").await.unwrap().unwrap();

        Users::new(&mut conn)
            .create(&crate::db::models::users::UserCreateDBRequest {
                name: "Viewer".to_string(),
                email: "viewer@crm.com".to_string(),
                phone: None,
                password_hash: None,
                role_id: Some(viewer.id),
                status: Default::default(),
                email_verified: false,
                profile: Default::default(),
            })
            .await
            .unwrap();

        let mut repo = Roles::new(&mut conn);
        assert_eq!(repo.user_count(viewer.id).await.unwrap(), 1);
        assert_eq!(repo.get_by_id(viewer.id).await.unwrap().unwrap().user_count, 1);

        // ON DELETE RESTRICT keeps referenced roles in place
        let err = repo.delete(viewer.id).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
