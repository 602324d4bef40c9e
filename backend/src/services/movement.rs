//! Stock movements (entradas, transferências, saídas)
//!
//! Each movement or cancellation runs in one transaction. The affected stock rows are
//! locked in location order before balances are checked, so concurrent movements on the
//! same product serialize and a balance never drops below zero.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::audit::AuditService;
use super::product::parse_stored;
use crate::error::{AppError, AppResult};
use shared::types::{PaginatedResponse, Pagination};
use shared::{check_delta, AuditAction, Movement, MovementDraft, MovementKind, MovementStatus, StockDelta};

#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMovementInput {
    pub kind: MovementKind,
    pub product_id: Uuid,
    pub origin_location_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,
    pub quantity: Decimal,
    pub customer_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub movement_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelMovementInput {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub kind: Option<MovementKind>,
    pub product_id: Option<Uuid>,
    /// Origin or destination
    pub location_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<MovementStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Movement with the labels a listing needs
#[derive(Debug, Clone, Serialize)]
pub struct MovementDetails {
    #[serde(flatten)]
    pub movement: Movement,
    pub idmm: String,
    pub origin_code: Option<String>,
    pub destination_code: Option<String>,
    pub customer_name: Option<String>,
}

/// A movement about to be written
pub(crate) struct NewMovement {
    pub draft: MovementDraft,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub movement_date: Option<NaiveDate>,
    pub import_batch_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    company_id: Uuid,
    kind: String,
    product_id: Uuid,
    origin_location_id: Option<Uuid>,
    destination_location_id: Option<Uuid>,
    quantity: Decimal,
    customer_id: Option<Uuid>,
    reference: Option<String>,
    notes: Option<String>,
    movement_date: NaiveDate,
    status: String,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<Uuid>,
    cancellation_reason: Option<String>,
    import_batch_id: Option<Uuid>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(Movement {
            id: row.id,
            company_id: row.company_id,
            kind: parse_stored(&row.kind)?,
            product_id: row.product_id,
            origin_location_id: row.origin_location_id,
            destination_location_id: row.destination_location_id,
            quantity: row.quantity,
            customer_id: row.customer_id,
            reference: row.reference,
            notes: row.notes,
            movement_date: row.movement_date,
            status: parse_stored(&row.status)?,
            cancelled_at: row.cancelled_at,
            cancelled_by: row.cancelled_by,
            cancellation_reason: row.cancellation_reason,
            import_batch_id: row.import_batch_id,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MovementDetailsRow {
    #[sqlx(flatten)]
    movement: MovementRow,
    idmm: String,
    origin_code: Option<String>,
    destination_code: Option<String>,
    customer_name: Option<String>,
}

const MOVEMENT_COLUMNS: &str = r#"
    m.id, m.company_id, m.kind, m.product_id, m.origin_location_id, m.destination_location_id,
    m.quantity, m.customer_id, m.reference, m.notes, m.movement_date, m.status, m.cancelled_at,
    m.cancelled_by, m.cancellation_reason, m.import_batch_id, m.created_by, m.created_at
"#;

const DETAILS_FROM: &str = r#"
    FROM movimentos m
    JOIN produtos p ON p.id = m.product_id
    LEFT JOIN locais o ON o.id = m.origin_location_id
    LEFT JOIN locais d ON d.id = m.destination_location_id
    LEFT JOIN clientes c ON c.id = m.customer_id
"#;

const MOVEMENT_FILTER: &str = r#"
    WHERE m.company_id = $1
      AND ($2::text IS NULL OR m.kind = $2)
      AND ($3::uuid IS NULL OR m.product_id = $3)
      AND ($4::uuid IS NULL OR m.origin_location_id = $4 OR m.destination_location_id = $4)
      AND ($5::uuid IS NULL OR m.customer_id = $5)
      AND ($6::text IS NULL OR m.status = $6)
      AND ($7::date IS NULL OR m.movement_date >= $7)
      AND ($8::date IS NULL OR m.movement_date <= $8)
"#;

impl MovementService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        input: CreateMovementInput,
    ) -> AppResult<Movement> {
        input.validate()?;

        let draft = MovementDraft {
            kind: input.kind,
            product_id: input.product_id,
            origin_location_id: input.origin_location_id,
            destination_location_id: input.destination_location_id,
            quantity: input.quantity,
            customer_id: input.customer_id,
        };
        draft.validate()?;

        let mut tx = self.db.begin().await?;

        check_references(&mut *tx, company_id, &draft).await?;
        let movement = insert_movement(
            &mut *tx,
            company_id,
            user_id,
            NewMovement {
                draft,
                reference: input.reference,
                notes: input.notes,
                movement_date: input.movement_date,
                import_batch_id: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            %company_id,
            movement_id = %movement.id,
            kind = %movement.kind,
            quantity = %movement.quantity,
            "movement created"
        );
        Ok(movement)
    }

    pub async fn list(
        &self,
        company_id: Uuid,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<MovementDetails>> {
        let kind = filter.kind.map(|k| k.as_str());
        let status = filter.status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM movimentos m {}",
            MOVEMENT_FILTER
        ))
        .bind(company_id)
        .bind(kind)
        .bind(filter.product_id)
        .bind(filter.location_id)
        .bind(filter.customer_id)
        .bind(status)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, MovementDetailsRow>(&format!(
            r#"
            SELECT {}, p.idmm, o.code AS origin_code, d.code AS destination_code,
                   c.name AS customer_name
            {}
            {}
            ORDER BY m.movement_date DESC, m.created_at DESC
            LIMIT $9 OFFSET $10
            "#,
            MOVEMENT_COLUMNS, DETAILS_FROM, MOVEMENT_FILTER
        ))
        .bind(company_id)
        .bind(kind)
        .bind(filter.product_id)
        .bind(filter.location_id)
        .bind(filter.customer_id)
        .bind(status)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let items = rows
            .into_iter()
            .map(MovementDetails::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(items, pagination, total.max(0) as u64))
    }

    pub async fn get(&self, company_id: Uuid, movement_id: Uuid) -> AppResult<MovementDetails> {
        sqlx::query_as::<_, MovementDetailsRow>(&format!(
            r#"
            SELECT {}, p.idmm, o.code AS origin_code, d.code AS destination_code,
                   c.name AS customer_name
            {}
            WHERE m.id = $1 AND m.company_id = $2
            "#,
            MOVEMENT_COLUMNS, DETAILS_FROM
        ))
        .bind(movement_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Movement".to_string()))?
        .try_into()
    }

    /// Cancel an active movement and reverse its effect on stock
    pub async fn cancel(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        movement_id: Uuid,
        input: CancelMovementInput,
    ) -> AppResult<Movement> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let current: Movement = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM movimentos m WHERE m.id = $1 AND m.company_id = $2 FOR UPDATE",
            MOVEMENT_COLUMNS
        ))
        .bind(movement_id)
        .bind(company_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Movement".to_string()))?
        .try_into()?;

        let status = current.status.cancel()?;
        let reversal = current.draft().reversal_deltas()?;
        apply_deltas(&mut *tx, company_id, current.product_id, &reversal).await?;

        let reason = input.reason.trim();
        let movement: Movement = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            UPDATE movimentos m SET
                status = $3, cancelled_at = NOW(), cancelled_by = $4, cancellation_reason = $5
            WHERE m.id = $1 AND m.company_id = $2
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(movement_id)
        .bind(company_id)
        .bind(status.as_str())
        .bind(user_id)
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::MovementCancel,
            Some(movement_id),
            json!({
                "kind": movement.kind,
                "product_id": movement.product_id,
                "quantity": movement.quantity,
                "reason": reason,
            }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(%company_id, %movement_id, "movement cancelled");
        Ok(movement)
    }
}

impl TryFrom<MovementDetailsRow> for MovementDetails {
    type Error = AppError;

    fn try_from(row: MovementDetailsRow) -> Result<Self, Self::Error> {
        Ok(MovementDetails {
            movement: row.movement.try_into()?,
            idmm: row.idmm,
            origin_code: row.origin_code,
            destination_code: row.destination_code,
            customer_name: row.customer_name,
        })
    }
}

/// Product, locations and customer must belong to the company and be active
async fn check_references(
    conn: &mut PgConnection,
    company_id: Uuid,
    draft: &MovementDraft,
) -> AppResult<()> {
    let product_active = sqlx::query_scalar::<_, bool>(
        "SELECT is_active FROM produtos WHERE id = $1 AND company_id = $2",
    )
    .bind(draft.product_id)
    .bind(company_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    if !product_active {
        return Err(AppError::Validation {
            field: "product_id".to_string(),
            message: "Product is inactive".to_string(),
            message_pt: "O produto está inativo".to_string(),
        });
    }

    for (field, location_id) in [
        ("origin_location_id", draft.origin_location_id),
        ("destination_location_id", draft.destination_location_id),
    ] {
        let Some(location_id) = location_id else {
            continue;
        };
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT is_active FROM locais WHERE id = $1 AND company_id = $2 FOR SHARE",
        )
        .bind(location_id)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Location".to_string()))?;

        // Stock may still leave an inactive location
        if !active && field == "destination_location_id" {
            return Err(AppError::Validation {
                field: field.to_string(),
                message: "Destination location is inactive".to_string(),
                message_pt: "O local de destino está inativo".to_string(),
            });
        }
    }

    if let Some(customer_id) = draft.customer_id {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM clientes WHERE id = $1 AND company_id = $2",
        )
        .bind(customer_id)
        .bind(company_id)
        .fetch_one(&mut *conn)
        .await?;
        if exists == 0 {
            return Err(AppError::NotFound("Customer".to_string()));
        }
    }

    Ok(())
}

/// Apply deltas to locked stock rows; fails without writing if any balance would go negative
///
/// Deltas must be sorted by location id so that locks are always taken in the same order.
pub(crate) async fn apply_deltas(
    conn: &mut PgConnection,
    company_id: Uuid,
    product_id: Uuid,
    deltas: &[StockDelta],
) -> AppResult<()> {
    let mut next = Vec::with_capacity(deltas.len());

    for delta in deltas {
        sqlx::query(
            r#"
            INSERT INTO stock (company_id, product_id, location_id, quantity)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (company_id, product_id, location_id) DO NOTHING
            "#,
        )
        .bind(company_id)
        .bind(product_id)
        .bind(delta.location_id)
        .execute(&mut *conn)
        .await?;

        let current = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT quantity FROM stock
            WHERE company_id = $1 AND product_id = $2 AND location_id = $3
            FOR UPDATE
            "#,
        )
        .bind(company_id)
        .bind(product_id)
        .bind(delta.location_id)
        .fetch_one(&mut *conn)
        .await?;

        next.push((delta.location_id, check_delta(delta.location_id, current, delta.delta)?));
    }

    for (location_id, quantity) in next {
        sqlx::query(
            r#"
            UPDATE stock SET quantity = $4, updated_at = NOW()
            WHERE company_id = $1 AND product_id = $2 AND location_id = $3
            "#,
        )
        .bind(company_id)
        .bind(product_id)
        .bind(location_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Apply a movement to stock, store it and audit it on the caller's transaction
pub(crate) async fn insert_movement(
    conn: &mut PgConnection,
    company_id: Uuid,
    user_id: Uuid,
    new: NewMovement,
) -> AppResult<Movement> {
    let deltas = new.draft.deltas()?;
    apply_deltas(&mut *conn, company_id, new.draft.product_id, &deltas).await?;

    let movement: Movement = sqlx::query_as::<_, MovementRow>(&format!(
        r#"
        INSERT INTO movimentos AS m (company_id, kind, product_id, origin_location_id,
                                     destination_location_id, quantity, customer_id, reference,
                                     notes, movement_date, import_batch_id, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, CURRENT_DATE), $11, $12)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    ))
    .bind(company_id)
    .bind(new.draft.kind.as_str())
    .bind(new.draft.product_id)
    .bind(new.draft.origin_location_id)
    .bind(new.draft.destination_location_id)
    .bind(new.draft.quantity)
    .bind(new.draft.customer_id)
    .bind(&new.reference)
    .bind(&new.notes)
    .bind(new.movement_date)
    .bind(new.import_batch_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?
    .try_into()?;

    AuditService::record(
        &mut *conn,
        company_id,
        user_id,
        AuditAction::MovementCreate,
        Some(movement.id),
        json!({
            "kind": movement.kind,
            "product_id": movement.product_id,
            "origin_location_id": movement.origin_location_id,
            "destination_location_id": movement.destination_location_id,
            "quantity": movement.quantity,
            "import_batch_id": movement.import_batch_id,
        }),
    )
    .await?;

    Ok(movement)
}
