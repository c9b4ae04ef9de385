//! Database repository for lead tags.

use crate::db::{errors::Result, models::tags::TagDBResponse};
use crate::types::{LeadId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Tags<'c> {
    db: &'c mut PgConnection,
}

/// Replace the tags attached to a lead, creating missing tags by name. Runs on the caller's
/// connection so it can share the lead write's transaction.
pub(crate) async fn set_lead_tags(conn: &mut PgConnection, lead_id: LeadId, names: &[String]) -> Result<()> {
    sqlx::query("DELETE FROM lead_tags WHERE lead_id = $1")
        .bind(lead_id)
        .execute(&mut *conn)
        .await?;

    for name in names {
        let tag = upsert(conn, name).await?;
        sqlx::query("INSERT INTO lead_tags (lead_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(lead_id)
            .bind(tag.id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn upsert(conn: &mut PgConnection, name: &str) -> Result<TagDBResponse> {
    // DO UPDATE rather than DO NOTHING so RETURNING yields the existing row
    let tag = sqlx::query_as::<_, TagDBResponse>(
        r#"
        INSERT INTO tags (id, name) VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, name, color, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name.trim())
    .fetch_one(&mut *conn)
    .await?;

    Ok(tag)
}

impl<'c> Tags<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<TagDBResponse>> {
        let tags = sqlx::query_as::<_, TagDBResponse>("SELECT id, name, color, created_at FROM tags ORDER BY name")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(tags)
    }

    #[instrument(skip(self), err)]
    pub async fn upsert_by_name(&mut self, name: &str) -> Result<TagDBResponse> {
        upsert(&mut *self.db, name).await
    }

    #[instrument(skip(self), fields(lead_id = %abbrev_uuid(&lead_id)), err)]
    pub async fn for_lead(&mut self, lead_id: LeadId) -> Result<Vec<TagDBResponse>> {
        let tags = sqlx::query_as::<_, TagDBResponse>(
            r#"
            SELECT t.id, t.name, t.color, t.created_at
            FROM lead_tags lt
            JOIN tags t ON lt.tag_id = t.id
            WHERE lt.lead_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(lead_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(tags)
    }
}
