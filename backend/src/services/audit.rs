//! Audit trail of changes made by users

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use shared::types::{PaginatedResponse, Pagination};
use shared::{AuditAction, AuditEntry};

/// Audit service
#[derive(Clone)]
pub struct AuditService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditFilter {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    company_id: Uuid,
    user_id: Option<Uuid>,
    action: String,
    entity_type: String,
    entity_id: Option<Uuid>,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        AuditEntry {
            id: row.id,
            company_id: row.company_id,
            user_id: row.user_id,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Write an audit entry on the caller's connection so it commits with the change
    pub async fn record(
        conn: &mut PgConnection,
        company_id: Uuid,
        user_id: Uuid,
        action: AuditAction,
        entity_id: Option<Uuid>,
        details: serde_json::Value,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (company_id, user_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .bind(action.as_str())
        .bind(action.entity_type())
        .bind(entity_id)
        .bind(details)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn list(
        &self,
        company_id: Uuid,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<AuditEntry>> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM audit_log {}",
            FILTER_CLAUSE
        ))
        .bind(company_id)
        .bind(&filter.action)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            r#"
            SELECT id, company_id, user_id, action, entity_type, entity_id, details, created_at
            FROM audit_log
            {}
            ORDER BY created_at DESC
            LIMIT $8 OFFSET $9
            "#,
            FILTER_CLAUSE
        ))
        .bind(company_id)
        .bind(&filter.action)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(AuditEntry::from).collect(),
            pagination,
            total.max(0) as u64,
        ))
    }
}

const FILTER_CLAUSE: &str = r#"
    WHERE company_id = $1
      AND ($2::text IS NULL OR action = $2)
      AND ($3::text IS NULL OR entity_type = $3)
      AND ($4::uuid IS NULL OR entity_id = $4)
      AND ($5::uuid IS NULL OR user_id = $5)
      AND ($6::date IS NULL OR created_at::date >= $6)
      AND ($7::date IS NULL OR created_at::date <= $7)
"#;
