//! Read-only access to the seeded permission catalogue.

use crate::db::{errors::Result, models::permissions::PermissionDBResponse};
use sqlx::PgConnection;
use tracing::instrument;

const PERMISSION_SELECT: &str = "SELECT id, name, module, action, display_name, description, created_at FROM permissions";

pub struct Permissions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Permissions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<PermissionDBResponse>> {
        let permissions = sqlx::query_as::<_, PermissionDBResponse>(&format!("{PERMISSION_SELECT} ORDER BY module, action, name"))
            .fetch_all(&mut *self.db)
            .await?;

        Ok(permissions)
    }

    /// Permissions matching the given names. Names that do not exist are simply absent.
    #[instrument(skip(self, names), fields(count = names.len()), err)]
    pub async fn get_by_names(&mut self, names: &[String]) -> Result<Vec<PermissionDBResponse>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let permissions = sqlx::query_as::<_, PermissionDBResponse>(&format!("{PERMISSION_SELECT} WHERE name = ANY($1) ORDER BY name"))
            .bind(names)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(permissions)
    }
}
