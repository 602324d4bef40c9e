//! Storage location (parque) management

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::audit::AuditService;
use crate::error::{AppError, AppResult};
use shared::import::{normalize_location_code, LocationRef};
use shared::{AuditAction, Location};

#[derive(Clone)]
pub struct LocationService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLocationInput {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLocationInput {
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Location with the number of products it currently holds
#[derive(Debug, Clone, Serialize)]
pub struct LocationWithStock {
    #[serde(flatten)]
    pub location: Location,
    pub product_count: i64,
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: Uuid,
    company_id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            company_id: row.company_id,
            code: row.code,
            name: row.name,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LocationStockRow {
    #[sqlx(flatten)]
    location: LocationRow,
    product_count: i64,
}

fn normalized_code(code: &str) -> AppResult<String> {
    let normalized = normalize_location_code(code);
    if normalized.is_empty() {
        return Err(AppError::Validation {
            field: "code".to_string(),
            message: "Location code must contain letters or digits".to_string(),
            message_pt: "O código do local deve conter letras ou dígitos".to_string(),
        });
    }
    Ok(normalized)
}

/// Locks the row so movements that read it (`FOR SHARE`) wait for the caller
const LOCK_LOCATION: &str = r#"
    SELECT id, company_id, code, name, description, is_active, created_at, updated_at
    FROM locais
    WHERE id = $1 AND company_id = $2
    FOR UPDATE
"#;

async fn lock_location(
    conn: &mut PgConnection,
    company_id: Uuid,
    location_id: Uuid,
) -> AppResult<LocationRow> {
    sqlx::query_as::<_, LocationRow>(LOCK_LOCATION)
        .bind(location_id)
        .bind(company_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Location".to_string()))
}

async fn held_quantity(conn: &mut PgConnection, location_id: Uuid) -> AppResult<Decimal> {
    let held = sqlx::query_scalar::<_, Option<Decimal>>(
        "SELECT SUM(quantity) FROM stock WHERE location_id = $1",
    )
    .bind(location_id)
    .fetch_one(conn)
    .await?;
    Ok(held.unwrap_or(Decimal::ZERO))
}

async fn movement_count(conn: &mut PgConnection, location_id: Uuid) -> AppResult<i64> {
    Ok(sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM movimentos
        WHERE origin_location_id = $1 OR destination_location_id = $1
        "#,
    )
    .bind(location_id)
    .fetch_one(conn)
    .await?)
}

fn ensure_empty(held: Decimal) -> AppResult<()> {
    if held > Decimal::ZERO {
        return Err(AppError::Conflict {
            resource: "location".to_string(),
            message: "Location still holds stock".to_string(),
            message_pt: "O local ainda tem stock".to_string(),
        });
    }
    Ok(())
}

fn ensure_no_history(movements: i64) -> AppResult<()> {
    if movements > 0 {
        return Err(AppError::Conflict {
            resource: "location".to_string(),
            message: "Location has movement history; deactivate it instead".to_string(),
            message_pt: "O local tem movimentos registados; desative-o em vez de o apagar"
                .to_string(),
        });
    }
    Ok(())
}

impl LocationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, company_id: Uuid, include_inactive: bool) -> AppResult<Vec<LocationWithStock>> {
        let rows = sqlx::query_as::<_, LocationStockRow>(
            r#"
            SELECT l.id, l.company_id, l.code, l.name, l.description, l.is_active,
                   l.created_at, l.updated_at,
                   COUNT(s.id) FILTER (WHERE s.quantity > 0) AS product_count
            FROM locais l
            LEFT JOIN stock s ON s.location_id = l.id
            WHERE l.company_id = $1 AND ($2 OR l.is_active)
            GROUP BY l.id
            ORDER BY l.code
            "#,
        )
        .bind(company_id)
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| LocationWithStock {
                location: r.location.into(),
                product_count: r.product_count,
            })
            .collect())
    }

    /// Locations as seen by the import matcher
    pub async fn refs(&self, company_id: Uuid) -> AppResult<Vec<LocationRef>> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, bool)>(
            "SELECT id, code, name, is_active FROM locais WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, code, name, is_active)| LocationRef {
                id,
                code,
                name,
                is_active,
            })
            .collect())
    }

    pub async fn get(&self, company_id: Uuid, location_id: Uuid) -> AppResult<Location> {
        sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT id, company_id, code, name, description, is_active, created_at, updated_at
            FROM locais
            WHERE id = $1 AND company_id = $2
            "#,
        )
        .bind(location_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .map(Location::from)
        .ok_or_else(|| AppError::NotFound("Location".to_string()))
    }

    async fn ensure_code_free(
        &self,
        company_id: Uuid,
        normalized: &str,
        except: Option<Uuid>,
    ) -> AppResult<()> {
        let taken = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM locais
            WHERE company_id = $1 AND normalized_code = $2 AND ($3::uuid IS NULL OR id <> $3)
            "#,
        )
        .bind(company_id)
        .bind(normalized)
        .bind(except)
        .fetch_one(&self.db)
        .await?;

        if taken > 0 {
            return Err(AppError::DuplicateEntry("code".to_string()));
        }
        Ok(())
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        input: CreateLocationInput,
    ) -> AppResult<Location> {
        input.validate()?;
        let normalized = normalized_code(&input.code)?;
        self.ensure_code_free(company_id, &normalized, None).await?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            INSERT INTO locais (company_id, code, normalized_code, name, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, company_id, code, name, description, is_active, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(input.code.trim().to_uppercase())
        .bind(&normalized)
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&mut *tx)
        .await?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::LocationCreate,
            Some(row.id),
            json!({ "code": row.code, "name": row.name }),
        )
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        location_id: Uuid,
        input: UpdateLocationInput,
    ) -> AppResult<Location> {
        input.validate()?;

        let normalized = match &input.code {
            Some(code) => {
                let normalized = normalized_code(code)?;
                self.ensure_code_free(company_id, &normalized, Some(location_id))
                    .await?;
                Some(normalized)
            }
            None => None,
        };

        let mut tx = self.db.begin().await?;
        lock_location(&mut *tx, company_id, location_id).await?;

        if input.is_active == Some(false) {
            ensure_empty(held_quantity(&mut *tx, location_id).await?)?;
        }

        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            UPDATE locais SET
                code = COALESCE($3, code),
                normalized_code = COALESCE($4, normalized_code),
                name = COALESCE($5, name),
                description = COALESCE($6, description),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING id, company_id, code, name, description, is_active, created_at, updated_at
            "#,
        )
        .bind(location_id)
        .bind(company_id)
        .bind(input.code.as_deref().map(|c| c.trim().to_uppercase()))
        .bind(&normalized)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::LocationUpdate,
            Some(location_id),
            json!({ "code": row.code, "is_active": row.is_active }),
        )
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete a location; refused while it holds stock or is referenced by movements
    pub async fn delete(&self, company_id: Uuid, user_id: Uuid, location_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let location = lock_location(&mut *tx, company_id, location_id).await?;

        ensure_empty(held_quantity(&mut *tx, location_id).await?)?;
        ensure_no_history(movement_count(&mut *tx, location_id).await?)?;

        sqlx::query("DELETE FROM stock WHERE location_id = $1")
            .bind(location_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM locais WHERE id = $1 AND company_id = $2")
            .bind(location_id)
            .bind(company_id)
            .execute(&mut *tx)
            .await?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::LocationDelete,
            Some(location_id),
            json!({ "code": location.code }),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_guards() {
        assert!(ensure_empty(Decimal::ZERO).is_ok());
        assert!(matches!(
            ensure_empty(Decimal::new(5, 1)),
            Err(AppError::Conflict { .. })
        ));
        assert!(ensure_no_history(0).is_ok());
        assert!(matches!(ensure_no_history(1), Err(AppError::Conflict { .. })));
    }

    #[test]
    fn guarded_writes_lock_the_location_row() {
        let sql = LOCK_LOCATION.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(sql.ends_with("WHERE id = $1 AND company_id = $2 FOR UPDATE"));
    }

    #[test]
    fn codes_must_have_letters_or_digits() {
        assert_eq!(normalized_code("Parque 01").unwrap(), "P1");
        assert!(normalized_code(" - ").is_err());
    }
}
