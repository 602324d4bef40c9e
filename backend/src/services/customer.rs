//! Customer (cliente) management

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::audit::AuditService;
use crate::error::{AppError, AppResult};
use shared::types::{PaginatedResponse, Pagination};
use shared::{AuditAction, Customer};

#[derive(Clone)]
pub struct CustomerService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom = "crate::validation::nif")]
    pub nif: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom = "crate::validation::phone")]
    pub phone: Option<String>,
    pub address: Option<String>,
    #[validate(custom = "crate::validation::postal_code")]
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    nif: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
    country: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            nif: row.nif,
            email: row.email,
            phone: row.phone,
            address: row.address,
            postal_code: row.postal_code,
            city: row.city,
            country: row.country,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const CUSTOMER_COLUMNS: &str = "id, company_id, name, nif, email, phone, address, postal_code, city, country, notes, created_at, updated_at";

/// NIF stored as bare digits
fn clean_nif(nif: &Option<String>) -> Option<String> {
    nif.as_ref().map(|n| {
        n.trim()
            .trim_start_matches("PT")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    })
}

impl CustomerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Search by name, NIF or e-mail
    pub async fn list(
        &self,
        company_id: Uuid,
        search: Option<&str>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Customer>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM clientes
            WHERE company_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR nif ILIKE $2 OR email ILIKE $2)
            "#,
        )
        .bind(company_id)
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            SELECT {}
            FROM clientes
            WHERE company_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR nif ILIKE $2 OR email ILIKE $2)
            ORDER BY name
            LIMIT $3 OFFSET $4
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(company_id)
        .bind(&pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(Customer::from).collect(),
            pagination,
            total.max(0) as u64,
        ))
    }

    pub async fn get(&self, company_id: Uuid, customer_id: Uuid) -> AppResult<Customer> {
        sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM clientes WHERE id = $1 AND company_id = $2",
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .map(Customer::from)
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        input: CustomerInput,
    ) -> AppResult<Customer> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            INSERT INTO clientes (company_id, name, nif, email, phone, address, postal_code, city, country, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(company_id)
        .bind(input.name.trim())
        .bind(clean_nif(&input.nif))
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.postal_code)
        .bind(&input.city)
        .bind(&input.country)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::CustomerCreate,
            Some(row.id),
            json!({ "name": row.name }),
        )
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Replace all customer fields
    pub async fn update(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        customer_id: Uuid,
        input: CustomerInput,
    ) -> AppResult<Customer> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            UPDATE clientes SET
                name = $3, nif = $4, email = $5, phone = $6, address = $7,
                postal_code = $8, city = $9, country = $10, notes = $11, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .bind(company_id)
        .bind(input.name.trim())
        .bind(clean_nif(&input.nif))
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.postal_code)
        .bind(&input.city)
        .bind(&input.country)
        .bind(&input.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::CustomerUpdate,
            Some(customer_id),
            json!({ "name": row.name }),
        )
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete a customer not referenced by any active exit
    pub async fn delete(&self, company_id: Uuid, user_id: Uuid, customer_id: Uuid) -> AppResult<()> {
        let customer = self.get(company_id, customer_id).await?;

        let active_exits = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM movimentos WHERE customer_id = $1 AND status = 'active'",
        )
        .bind(customer_id)
        .fetch_one(&self.db)
        .await?;

        if active_exits > 0 {
            return Err(AppError::Conflict {
                resource: "customer".to_string(),
                message: format!("Customer is referenced by {} active exits", active_exits),
                message_pt: format!("O cliente está associado a {} saídas ativas", active_exits),
            });
        }

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE movimentos SET customer_id = NULL WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM clientes WHERE id = $1 AND company_id = $2")
            .bind(customer_id)
            .bind(company_id)
            .execute(&mut *tx)
            .await?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::CustomerDelete,
            Some(customer_id),
            json!({ "name": customer.name }),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
