//! Database repository for interactions logged against leads.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::interactions::{InteractionCreateDBRequest, InteractionDBResponse, InteractionUpdateDBRequest},
};
use crate::types::{InteractionId, LeadId, UserId, abbrev_uuid};
use chrono::Utc;
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing interactions
#[derive(Debug, Clone, Default)]
pub struct InteractionFilter {
    pub skip: i64,
    pub limit: i64,
    pub lead_id: Option<LeadId>,
    pub user_id: Option<UserId>,
    /// Restrict to interactions on leads owned by this user or unassigned
    pub visible_to: Option<UserId>,
}

impl InteractionFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

const INTERACTION_SELECT: &str = r#"
    SELECT
        i.id, i.lead_id, l.name AS lead_name, l.company AS lead_company, l.responsible_id AS lead_responsible_id,
        i.user_id, u.name AS user_name,
        i.type, i.channel, i.phone_used, i.result, i.duration, i.notes,
        i.scheduled_at, i.completed_at, i.created_at, i.updated_at
    FROM interactions i
    JOIN leads l ON i.lead_id = l.id
    JOIN users u ON i.user_id = u.id
"#;

const INTERACTION_FILTER_WHERE: &str = r#"
    WHERE ($1::uuid IS NULL OR i.lead_id = $1)
      AND ($2::uuid IS NULL OR i.user_id = $2)
      AND ($3::uuid IS NULL OR l.responsible_id = $3 OR l.responsible_id IS NULL)
"#;

pub struct Interactions<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Interactions<'c> {
    type CreateRequest = InteractionCreateDBRequest;
    type UpdateRequest = InteractionUpdateDBRequest;
    type Response = InteractionDBResponse;
    type Id = InteractionId;
    type Filter = InteractionFilter;

    #[instrument(skip(self, request), fields(lead_id = %abbrev_uuid(&request.lead_id), user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let interaction_id = Uuid::new_v4();
        let completed_at = request.completed_at.unwrap_or_else(Utc::now);

        // The lead's last_interaction_date moves with the insert
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO interactions (
                id, lead_id, user_id, type, channel, phone_used, result, duration, notes,
                scheduled_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(interaction_id)
        .bind(request.lead_id)
        .bind(request.user_id)
        .bind(request.interaction_type)
        .bind(request.channel)
        .bind(&request.phone_used)
        .bind(request.result)
        .bind(request.duration)
        .bind(&request.notes)
        .bind(request.scheduled_at)
        .bind(completed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE leads SET last_interaction_date = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(request.lead_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_by_id(interaction_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(interaction_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let interaction = sqlx::query_as::<_, InteractionDBResponse>(&format!("{INTERACTION_SELECT} WHERE i.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(interaction)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let interactions = sqlx::query_as::<_, InteractionDBResponse>(&format!(
            "{INTERACTION_SELECT} {INTERACTION_FILTER_WHERE} ORDER BY i.created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(filter.lead_id)
        .bind(filter.user_id)
        .bind(filter.visible_to)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(interactions)
    }

    #[instrument(skip(self), fields(interaction_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM interactions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(interaction_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query(
            r#"
            UPDATE interactions SET
                type = COALESCE($2, type),
                channel = COALESCE($3, channel),
                phone_used = COALESCE($4, phone_used),
                result = COALESCE($5, result),
                duration = COALESCE($6, duration),
                notes = COALESCE($7, notes),
                scheduled_at = COALESCE($8, scheduled_at),
                completed_at = COALESCE($9, completed_at),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(request.interaction_type)
        .bind(request.channel)
        .bind(&request.phone_used)
        .bind(request.result)
        .bind(request.duration)
        .bind(&request.notes)
        .bind(request.scheduled_at)
        .bind(request.completed_at)
        .execute(&mut *self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Interactions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total rows matching the filter, ignoring skip/limit
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &InteractionFilter) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM interactions i JOIN leads l ON i.lead_id = l.id {INTERACTION_FILTER_WHERE}"
        ))
        .bind(filter.lead_id)
        .bind(filter.user_id)
        .bind(filter.visible_to)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Leads, Users};
    use crate::db::models::{
        interactions::{InteractionChannel, InteractionResult, InteractionType},
        leads::LeadCreateDBRequest,
        users::UserCreateDBRequest,
    };
    use sqlx::PgPool;

    async fn fixture(conn: &mut PgConnection, email: &str, owned: bool) -> (UserId, LeadId) {
        let user = Users::new(conn)
            .create(&UserCreateDBRequest {
                name: "Agent".to_string(),
                email: email.to_string(),
                phone: None,
                password_hash: None,
                role_id: None,
                status: Default::default(),
                email_verified: false,
                profile: Default::default(),
            })
            .await
            .unwrap();

        let lead = Leads::new(conn)
            .create(&LeadCreateDBRequest {
                name: format!("Lead of {email}"),
                email: None,
                phone: None,
                company: Some("Initech".to_string()),
                position: None,
                status: Default::default(),
                source: Default::default(),
                segment: None,
                potential_value: None,
                notes: None,
                responsible_id: owned.then_some(user.id),
                tags: vec![],
            })
            .await
            .unwrap();

        (user.id, lead.id)
    }

    fn call(lead_id: LeadId, user_id: UserId) -> InteractionCreateDBRequest {
        InteractionCreateDBRequest {
            lead_id,
            user_id,
            interaction_type: InteractionType::Call,
            channel: InteractionChannel::Phone,
            phone_used: Some("+34600111222".to_string()),
            result: InteractionResult::Successful,
            duration: Some(15),
            notes: None,
            scheduled_at: None,
            completed_at: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_stamps_lead_and_completed_at(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (user_id, lead_id) = fixture(&mut conn, "agent@crm.com", true).await;

        let interaction = Interactions::new(&mut conn).create(&call(lead_id, user_id)).await.unwrap();
        assert!(interaction.completed_at.is_some());
        assert_eq!(interaction.lead_company.as_deref(), Some("Initech"));
        assert_eq!(interaction.lead_responsible_id, Some(user_id));
        assert_eq!(interaction.user_name, "Agent");

        let lead = Leads::new(&mut conn).get_by_id(lead_id).await.unwrap().unwrap();
        assert!(lead.last_interaction_date.is_some());
        assert_eq!(lead.interaction_count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_on_missing_lead_is_foreign_key_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (user_id, _) = fixture(&mut conn, "agent@crm.com", true).await;

        let err = Interactions::new(&mut conn).create(&call(Uuid::new_v4(), user_id)).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_partial_update_keeps_other_fields(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (user_id, lead_id) = fixture(&mut conn, "agent@crm.com", true).await;
        let mut repo = Interactions::new(&mut conn);
        let created = repo.create(&call(lead_id, user_id)).await.unwrap();

        let updated = repo
            .update(
                created.id,
                &InteractionUpdateDBRequest {
                    result: Some(InteractionResult::CallbackRequested),
                    notes: Some("Call back Monday".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.result, InteractionResult::CallbackRequested);
        assert_eq!(updated.interaction_type, InteractionType::Call);
        assert_eq!(updated.duration, Some(15));
        assert_eq!(updated.notes.as_deref(), Some("Call back Monday"));

        assert!(repo.delete(created.id).await.unwrap());
        assert!(matches!(
            repo.update(created.id, &InteractionUpdateDBRequest::default()).await,
            Err(DbError::NotFound)
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_visibility(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (rep, rep_lead) = fixture(&mut conn, "rep@crm.com", true).await;
        let (other, other_lead) = fixture(&mut conn, "other@crm.com", true).await;
        let mut repo = Interactions::new(&mut conn);

        repo.create(&call(rep_lead, rep)).await.unwrap();
        repo.create(&call(other_lead, other)).await.unwrap();
        repo.create(&call(other_lead, rep)).await.unwrap();

        assert_eq!(repo.count(&InteractionFilter::new(0, 50)).await.unwrap(), 3);

        let by_lead = InteractionFilter {
            lead_id: Some(other_lead),
            ..InteractionFilter::new(0, 50)
        };
        assert_eq!(repo.list(&by_lead).await.unwrap().len(), 2);

        let by_user = InteractionFilter {
            user_id: Some(rep),
            ..InteractionFilter::new(0, 50)
        };
        assert_eq!(repo.count(&by_user).await.unwrap(), 2);

        let visible = InteractionFilter {
            visible_to: Some(rep),
            ..InteractionFilter::new(0, 50)
        };
        let listed = repo.list(&visible).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].lead_id, rep_lead);
    }
}
