//! Database repository for leads.

use crate::db::{
    errors::{DbError, Result},
    handlers::{repository::Repository, tags::set_lead_tags},
    models::leads::{LeadCreateDBRequest, LeadDBResponse, LeadSource, LeadStatus, LeadUpdateDBRequest},
};
use crate::types::{LeadId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing leads
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<LeadStatus>,
    /// Case-insensitive match against name, email and company
    pub search: Option<String>,
    pub responsible_id: Option<UserId>,
    /// Restrict to leads owned by this user or unassigned
    pub visible_to: Option<UserId>,
}

impl LeadFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")))
    }
}

const LEAD_COLUMNS: &str = r#"
        l.id, l.name, l.email, l.phone, l.company, l.position, l.status, l.source, l.segment,
        l.potential_value, l.notes, l.responsible_id,
        u.name AS responsible_name, u.email AS responsible_email,
        l.last_interaction_date, l.created_at, l.updated_at,
        (SELECT COUNT(*) FROM interactions i WHERE i.lead_id = l.id) AS interaction_count,
        ARRAY(
            SELECT t.name::text FROM lead_tags lt JOIN tags t ON lt.tag_id = t.id
            WHERE lt.lead_id = l.id ORDER BY t.name
        ) AS tags
"#;

const LEAD_FROM: &str = "FROM leads l LEFT JOIN users u ON l.responsible_id = u.id";

const PRIORITY_SCORE: &str = r#"
        ROUND(
            CASE l.status
                WHEN 'NEW' THEN 100
                WHEN 'CONTACTED' THEN 80
                WHEN 'QUALIFIED' THEN 120
                WHEN 'PROPOSAL' THEN 150
                WHEN 'NEGOTIATION' THEN 200
                ELSE 50
            END
            + LEAST(COALESCE(l.potential_value, 0) / 100, 100)
            + CASE
                WHEN l.last_interaction_date IS NULL THEN 75
                WHEN l.last_interaction_date < NOW() - INTERVAL '7 days' THEN 50
                ELSE 0
            END
        )::bigint
"#;

const LEAD_FILTER_WHERE: &str = r#"
    WHERE ($1::text IS NULL OR l.status = $1)
      AND ($2::uuid IS NULL OR l.responsible_id = $2)
      AND ($3::text IS NULL OR l.name ILIKE $3 OR l.email ILIKE $3 OR l.company ILIKE $3)
      AND ($4::uuid IS NULL OR l.responsible_id = $4 OR l.responsible_id IS NULL)
"#;

#[derive(Debug, Clone, FromRow)]
struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: LeadStatus,
    pub source: LeadSource,
    pub segment: Option<String>,
    pub potential_value: Option<Decimal>,
    pub notes: Option<String>,
    pub responsible_id: Option<UserId>,
    pub responsible_name: Option<String>,
    pub responsible_email: Option<String>,
    pub last_interaction_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub interaction_count: i64,
    pub tags: Vec<String>,
    pub priority_score: Option<i64>,
}

impl From<Lead> for LeadDBResponse {
    fn from(lead: Lead) -> Self {
        Self {
            id: lead.id,
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            company: lead.company,
            position: lead.position,
            status: lead.status,
            source: lead.source,
            segment: lead.segment,
            potential_value: lead.potential_value,
            notes: lead.notes,
            responsible_id: lead.responsible_id,
            responsible_name: lead.responsible_name,
            responsible_email: lead.responsible_email,
            last_interaction_date: lead.last_interaction_date,
            created_at: lead.created_at,
            updated_at: lead.updated_at,
            interaction_count: lead.interaction_count,
            tags: lead.tags,
            priority_score: lead.priority_score,
        }
    }
}

fn lead_select(condition: &str) -> String {
    format!("SELECT {LEAD_COLUMNS}, NULL::bigint AS priority_score {LEAD_FROM} {condition}")
}

pub struct Leads<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Leads<'c> {
    type CreateRequest = LeadCreateDBRequest;
    type UpdateRequest = LeadUpdateDBRequest;
    type Response = LeadDBResponse;
    type Id = LeadId;
    type Filter = LeadFilter;

    #[instrument(skip(self, request), fields(tags = request.tags.len()), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let lead_id = Uuid::new_v4();
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO leads (
                id, name, email, phone, company, position, status, source, segment,
                potential_value, notes, responsible_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(lead_id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.company)
        .bind(&request.position)
        .bind(request.status)
        .bind(request.source)
        .bind(&request.segment)
        .bind(request.potential_value)
        .bind(&request.notes)
        .bind(request.responsible_id)
        .execute(&mut *tx)
        .await?;

        if !request.tags.is_empty() {
            set_lead_tags(&mut tx, lead_id, &request.tags).await?;
        }

        tx.commit().await?;

        self.get_by_id(lead_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(lead_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let lead = sqlx::query_as::<_, Lead>(&lead_select("WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(lead.map(LeadDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let leads = sqlx::query_as::<_, Lead>(&lead_select(&format!(
            "{LEAD_FILTER_WHERE} ORDER BY l.created_at DESC LIMIT $5 OFFSET $6"
        )))
        .bind(filter.status)
        .bind(filter.responsible_id)
        .bind(filter.search_pattern())
        .bind(filter.visible_to)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(leads.into_iter().map(LeadDBResponse::from).collect())
    }

    #[instrument(skip(self), fields(lead_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(lead_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        {
            let mut tx = self.db.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE leads SET
                    name = $2,
                    email = $3,
                    phone = $4,
                    company = $5,
                    position = $6,
                    status = COALESCE($7, status),
                    source = COALESCE($8, source),
                    segment = $9,
                    potential_value = $10,
                    notes = $11,
                    responsible_id = $12,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&request.name)
            .bind(&request.email)
            .bind(&request.phone)
            .bind(&request.company)
            .bind(&request.position)
            .bind(request.status)
            .bind(request.source)
            .bind(&request.segment)
            .bind(request.potential_value)
            .bind(&request.notes)
            .bind(request.responsible_id)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(DbError::NotFound);
            }

            if let Some(tags) = &request.tags {
                set_lead_tags(&mut tx, id, tags).await?;
            }

            tx.commit().await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Leads<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total rows matching the filter, ignoring skip/limit
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &LeadFilter) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {LEAD_FROM} {LEAD_FILTER_WHERE}"))
            .bind(filter.status)
            .bind(filter.responsible_id)
            .bind(filter.search_pattern())
            .bind(filter.visible_to)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(total)
    }

    /// All visible leads ordered by priority score, highest first
    #[instrument(skip(self), err)]
    pub async fn priority_list(&mut self, visible_to: Option<UserId>) -> Result<Vec<LeadDBResponse>> {
        let leads = sqlx::query_as::<_, Lead>(&format!(
            r#"
            SELECT {LEAD_COLUMNS}, {PRIORITY_SCORE} AS priority_score
            {LEAD_FROM}
            WHERE ($1::uuid IS NULL OR l.responsible_id = $1 OR l.responsible_id IS NULL)
            ORDER BY priority_score DESC, l.created_at DESC
            "#
        ))
        .bind(visible_to)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(leads.into_iter().map(LeadDBResponse::from).collect())
    }

    /// `None` when the lead does not exist, `Some(None)` when it is unassigned.
    #[instrument(skip(self), fields(lead_id = %abbrev_uuid(&id)), err)]
    pub async fn owner_of(&mut self, id: LeadId) -> Result<Option<Option<UserId>>> {
        let owner = sqlx::query_scalar::<_, Option<UserId>>("SELECT responsible_id FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Users;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    fn lead(name: &str, responsible_id: Option<UserId>) -> LeadCreateDBRequest {
        LeadCreateDBRequest {
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
            phone: None,
            company: Some("Acme".to_string()),
            position: None,
            status: LeadStatus::New,
            source: LeadSource::Website,
            segment: None,
            potential_value: None,
            notes: None,
            responsible_id,
            tags: vec![],
        }
    }

    async fn create_user(conn: &mut PgConnection, email: &str) -> UserId {
        Users::new(conn)
            .create(&UserCreateDBRequest {
                name: "Owner".to_string(),
                email: email.to_string(),
                phone: None,
                password_hash: None,
                role_id: None,
                status: Default::default(),
                email_verified: false,
                profile: Default::default(),
            })
            .await
            .unwrap()
            .id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_lead_with_tags(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner@crm.com").await;
        let mut repo = Leads::new(&mut conn);

        let mut request = lead("Jane Doe", Some(owner));
        request.tags = vec!["vip".to_string(), "enterprise".to_string()];
        let created = repo.create(&request).await.unwrap();

        assert_eq!(created.status, LeadStatus::New);
        assert_eq!(created.tags, vec!["enterprise", "vip"]);
        assert_eq!(created.responsible_name.as_deref(), Some("Owner"));
        assert_eq!(created.interaction_count, 0);
        assert!(created.priority_score.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_replaces_fields_and_tags(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        let mut request = lead("Replace Me", None);
        request.tags = vec!["old".to_string()];
        request.notes = Some("keep?".to_string());
        let created = repo.create(&request).await.unwrap();

        let updated = repo
            .update(
                created.id,
                &LeadUpdateDBRequest {
                    name: "Replaced".to_string(),
                    email: None,
                    phone: None,
                    company: None,
                    position: None,
                    status: Some(LeadStatus::Qualified),
                    source: None,
                    segment: None,
                    potential_value: Some(Decimal::new(150_000, 2)),
                    notes: None,
                    responsible_id: None,
                    tags: Some(vec!["new".to_string()]),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Replaced");
        assert_eq!(updated.status, LeadStatus::Qualified);
        // Source kept, notes cleared
        assert_eq!(updated.source, LeadSource::Website);
        assert!(updated.notes.is_none());
        assert_eq!(updated.tags, vec!["new"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_visibility(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let rep = create_user(&mut conn, "rep@crm.com").await;
        let other = create_user(&mut conn, "other@crm.com").await;
        let mut repo = Leads::new(&mut conn);

        repo.create(&lead("Mine", Some(rep))).await.unwrap();
        repo.create(&lead("Theirs", Some(other))).await.unwrap();
        let mut unassigned = lead("Nobody", None);
        unassigned.status = LeadStatus::Contacted;
        repo.create(&unassigned).await.unwrap();

        let all = LeadFilter::new(0, 20);
        assert_eq!(repo.list(&all).await.unwrap().len(), 3);
        assert_eq!(repo.count(&all).await.unwrap(), 3);

        let visible = LeadFilter {
            visible_to: Some(rep),
            ..LeadFilter::new(0, 20)
        };
        let mut names: Vec<String> = repo.list(&visible).await.unwrap().into_iter().map(|l| l.name).collect();
        names.sort();
        assert_eq!(names, vec!["Mine", "Nobody"]);
        assert_eq!(repo.count(&visible).await.unwrap(), 2);

        let by_status = LeadFilter {
            status: Some(LeadStatus::Contacted),
            ..LeadFilter::new(0, 20)
        };
        assert_eq!(repo.list(&by_status).await.unwrap()[0].name, "Nobody");

        let search = LeadFilter {
            search: Some("THEIR".to_string()),
            ..LeadFilter::new(0, 20)
        };
        assert_eq!(repo.count(&search).await.unwrap(), 1);

        let page = repo.list(&LeadFilter::new(2, 2)).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_priority_list_orders_by_score(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        let mut negotiation = lead("Hot", None);
        negotiation.status = LeadStatus::Negotiation;
        negotiation.potential_value = Some(Decimal::new(50_000, 0));
        repo.create(&negotiation).await.unwrap();

        let mut lost = lead("Cold", None);
        lost.status = LeadStatus::ClosedLost;
        repo.create(&lost).await.unwrap();

        let leads = repo.priority_list(None).await.unwrap();
        assert_eq!(leads[0].name, "Hot");
        // 200 status + 100 capped value + 75 never contacted
        assert_eq!(leads[0].priority_score, Some(375));
        // 50 status + 75 never contacted
        assert_eq!(leads[1].priority_score, Some(125));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_priority_score_without_value_gets_no_value_bonus(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        repo.create(&lead("No Value", None)).await.unwrap();
        let mut small = lead("Small Value", None);
        small.potential_value = Some(Decimal::new(1_000, 0));
        repo.create(&small).await.unwrap();
        let mut lost = lead("Lost", None);
        lost.status = LeadStatus::ClosedLost;
        repo.create(&lost).await.unwrap();

        let scores: Vec<(String, Option<i64>)> = repo
            .priority_list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|l| (l.name, l.priority_score))
            .collect();

        assert_eq!(
            scores,
            vec![
                // 100 status + 10 value + 75 never contacted
                ("Small Value".to_string(), Some(185)),
                ("No Value".to_string(), Some(175)),
                ("Lost".to_string(), Some(125)),
            ]
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_owner_of(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner@crm.com").await;
        let mut repo = Leads::new(&mut conn);

        let owned = repo.create(&lead("Owned", Some(owner))).await.unwrap();
        let free = repo.create(&lead("Free", None)).await.unwrap();

        assert_eq!(repo.owner_of(owned.id).await.unwrap(), Some(Some(owner)));
        assert_eq!(repo.owner_of(free.id).await.unwrap(), Some(None));
        assert_eq!(repo.owner_of(Uuid::new_v4()).await.unwrap(), None);

        assert!(repo.delete(free.id).await.unwrap());
        assert!(repo.get_by_id(free.id).await.unwrap().is_none());
    }
}
