//! Product (produto) and parga management

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::audit::AuditService;
use crate::error::{AppError, AppResult};
use shared::types::{PaginatedResponse, Pagination};
use shared::{
    normalize_idmm, parse_dimensions, AuditAction, Dimensions, Parga, Product, ProductKind,
    StockUnit,
};

#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Parse an enum stored as text
pub(crate) fn parse_stored<T>(value: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| AppError::Internal(format!("Stored value is invalid: {}", e)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(custom = "crate::validation::idmm")]
    pub idmm: String,
    #[validate(length(min = 1, max = 200))]
    pub variety: String,
    pub kind: ProductKind,
    #[validate(length(max = 100))]
    pub finish: Option<String>,
    /// Free text such as "300 x 200 x 2"; separate fields win
    pub dimensions: Option<String>,
    pub length_cm: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub thickness_cm: Option<Decimal>,
    pub unit: Option<StockUnit>,
    pub unit_price: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub variety: Option<String>,
    pub kind: Option<ProductKind>,
    #[validate(length(max = 100))]
    pub finish: Option<String>,
    pub dimensions: Option<String>,
    pub length_cm: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub thickness_cm: Option<Decimal>,
    pub unit: Option<StockUnit>,
    pub unit_price: Option<Decimal>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    /// Matches IDMM or variety
    pub search: Option<String>,
    pub kind: Option<ProductKind>,
    /// Only products with stock at this location
    pub location_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductListItem {
    #[serde(flatten)]
    pub product: Product,
    pub total_quantity: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PargaInput {
    /// Next free number when omitted
    #[validate(range(min = 1))]
    pub number: Option<i32>,
    #[validate(range(min = 0))]
    pub slab_count: Option<i32>,
    pub dimensions: Option<String>,
    pub length_cm: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub thickness_cm: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ProductRow {
    id: Uuid,
    company_id: Uuid,
    idmm: String,
    variety: String,
    kind: String,
    finish: Option<String>,
    length_cm: Option<Decimal>,
    width_cm: Option<Decimal>,
    thickness_cm: Option<Decimal>,
    unit: String,
    unit_price: Option<Decimal>,
    photo_url: Option<String>,
    photo_hd_url: Option<String>,
    notes: Option<String>,
    is_active: bool,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            company_id: row.company_id,
            idmm: row.idmm,
            variety: row.variety,
            kind: parse_stored(&row.kind)?,
            finish: row.finish,
            dimensions: Dimensions {
                length_cm: row.length_cm,
                width_cm: row.width_cm,
                thickness_cm: row.thickness_cm,
            },
            unit: parse_stored(&row.unit)?,
            unit_price: row.unit_price,
            photo_url: row.photo_url,
            photo_hd_url: row.photo_hd_url,
            notes: row.notes,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProductListRow {
    #[sqlx(flatten)]
    product: ProductRow,
    total_quantity: Decimal,
}

#[derive(Debug, FromRow)]
struct PargaRow {
    id: Uuid,
    company_id: Uuid,
    product_id: Uuid,
    number: i32,
    slab_count: Option<i32>,
    length_cm: Option<Decimal>,
    width_cm: Option<Decimal>,
    thickness_cm: Option<Decimal>,
    photo_url: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PargaRow> for Parga {
    fn from(row: PargaRow) -> Self {
        Parga {
            id: row.id,
            company_id: row.company_id,
            product_id: row.product_id,
            number: row.number,
            slab_count: row.slab_count,
            dimensions: Dimensions {
                length_cm: row.length_cm,
                width_cm: row.width_cm,
                thickness_cm: row.thickness_cm,
            },
            photo_url: row.photo_url,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) const PRODUCT_COLUMNS: &str = r#"
    p.id, p.company_id, p.idmm, p.variety, p.kind, p.finish, p.length_cm, p.width_cm,
    p.thickness_cm, p.unit, p.unit_price, p.photo_url, p.photo_hd_url, p.notes, p.is_active,
    p.created_by, p.created_at, p.updated_at
"#;

const PARGA_COLUMNS: &str = "id, company_id, product_id, number, slab_count, length_cm, width_cm, thickness_cm, photo_url, notes, created_at, updated_at";

/// Combine a free-text dimension string with explicit fields
fn resolve_dimensions(
    text: Option<&str>,
    length_cm: Option<Decimal>,
    width_cm: Option<Decimal>,
    thickness_cm: Option<Decimal>,
) -> AppResult<Option<Dimensions>> {
    let mut dimensions = match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => parse_dimensions(text).map_err(|e| AppError::Validation {
            field: "dimensions".to_string(),
            message: e.to_string(),
            message_pt: format!("Dimensões inválidas: {}", text),
        })?,
        None => Dimensions::default(),
    };
    dimensions.length_cm = length_cm.or(dimensions.length_cm);
    dimensions.width_cm = width_cm.or(dimensions.width_cm);
    dimensions.thickness_cm = thickness_cm.or(dimensions.thickness_cm);

    for value in [dimensions.length_cm, dimensions.width_cm, dimensions.thickness_cm]
        .into_iter()
        .flatten()
    {
        if value <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "dimensions".to_string(),
                message: "Dimensions must be positive".to_string(),
                message_pt: "As dimensões devem ser positivas".to_string(),
            });
        }
    }

    Ok((!dimensions.is_empty()).then_some(dimensions))
}

fn check_price(price: Option<Decimal>) -> AppResult<()> {
    if matches!(price, Some(p) if p < Decimal::ZERO) {
        return Err(AppError::Validation {
            field: "unit_price".to_string(),
            message: "Unit price cannot be negative".to_string(),
            message_pt: "O preço unitário não pode ser negativo".to_string(),
        });
    }
    Ok(())
}

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        company_id: Uuid,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<ProductListItem>> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));
        let kind = filter.kind.map(|k| k.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM produtos p {}",
            PRODUCT_FILTER
        ))
        .bind(company_id)
        .bind(&pattern)
        .bind(kind)
        .bind(filter.location_id)
        .bind(filter.is_active)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, ProductListRow>(&format!(
            r#"
            SELECT {},
                   COALESCE((SELECT SUM(s.quantity) FROM stock s WHERE s.product_id = p.id), 0)
                       AS total_quantity
            FROM produtos p
            {}
            ORDER BY p.idmm
            LIMIT $6 OFFSET $7
            "#,
            PRODUCT_COLUMNS, PRODUCT_FILTER
        ))
        .bind(company_id)
        .bind(&pattern)
        .bind(kind)
        .bind(filter.location_id)
        .bind(filter.is_active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let items = rows
            .into_iter()
            .map(|r| {
                Ok(ProductListItem {
                    product: r.product.try_into()?,
                    total_quantity: r.total_quantity,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(items, pagination, total.max(0) as u64))
    }

    pub async fn get(&self, company_id: Uuid, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM produtos p WHERE p.id = $1 AND p.company_id = $2",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?
        .try_into()
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        input: CreateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        check_price(input.unit_price)?;
        let dimensions = resolve_dimensions(
            input.dimensions.as_deref(),
            input.length_cm,
            input.width_cm,
            input.thickness_cm,
        )?
        .unwrap_or_default();

        let mut tx = self.db.begin().await?;
        let product = insert_product(
            &mut *tx,
            company_id,
            user_id,
            NewProduct {
                idmm: normalize_idmm(&input.idmm),
                variety: input.variety.trim().to_string(),
                kind: input.kind,
                finish: input.finish,
                dimensions,
                unit: input.unit.unwrap_or_else(|| input.kind.default_unit()),
                unit_price: input.unit_price,
                photo_url: None,
                photo_hd_url: None,
                notes: input.notes,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(%company_id, idmm = %product.idmm, "product created");
        Ok(product)
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        check_price(input.unit_price)?;
        let dimensions = resolve_dimensions(
            input.dimensions.as_deref(),
            input.length_cm,
            input.width_cm,
            input.thickness_cm,
        )?
        .unwrap_or_default();

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE produtos p SET
                variety = COALESCE($3, variety),
                kind = COALESCE($4, kind),
                finish = COALESCE($5, finish),
                length_cm = COALESCE($6, length_cm),
                width_cm = COALESCE($7, width_cm),
                thickness_cm = COALESCE($8, thickness_cm),
                unit = COALESCE($9, unit),
                unit_price = COALESCE($10, unit_price),
                notes = COALESCE($11, notes),
                is_active = COALESCE($12, is_active),
                updated_at = NOW()
            WHERE p.id = $1 AND p.company_id = $2
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(company_id)
        .bind(input.variety.as_deref().map(str::trim))
        .bind(input.kind.map(|k| k.as_str()))
        .bind(&input.finish)
        .bind(dimensions.length_cm)
        .bind(dimensions.width_cm)
        .bind(dimensions.thickness_cm)
        .bind(input.unit.map(|u| u.as_str()))
        .bind(input.unit_price)
        .bind(&input.notes)
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::ProductUpdate,
            Some(product_id),
            json!({ "idmm": row.idmm, "is_active": row.is_active }),
        )
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Delete a product without stock or movement history
    pub async fn delete(&self, company_id: Uuid, user_id: Uuid, product_id: Uuid) -> AppResult<()> {
        let product = self.get(company_id, product_id).await?;

        let held = sqlx::query_scalar::<_, Option<Decimal>>(
            "SELECT SUM(quantity) FROM stock WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?
        .unwrap_or(Decimal::ZERO);
        if held > Decimal::ZERO {
            return Err(AppError::Conflict {
                resource: "product".to_string(),
                message: format!("Product has {} in stock; deactivate it instead", held),
                message_pt: format!("O produto tem {} em stock; desative-o em vez de o apagar", held),
            });
        }

        let movements = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM movimentos WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;
        if movements > 0 {
            return Err(AppError::Conflict {
                resource: "product".to_string(),
                message: "Product has movement history; deactivate it instead".to_string(),
                message_pt: "O produto tem movimentos registados; desative-o em vez de o apagar"
                    .to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM produtos WHERE id = $1 AND company_id = $2")
            .bind(product_id)
            .bind(company_id)
            .execute(&mut *tx)
            .await?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::ProductDelete,
            Some(product_id),
            json!({ "idmm": product.idmm }),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Point the product at a stored photo
    pub async fn set_photo_url(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        product_id: Uuid,
        url: &str,
        hd: bool,
    ) -> AppResult<Product> {
        let column = if hd { "photo_hd_url" } else { "photo_url" };

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE produtos p SET {} = $3, updated_at = NOW()
            WHERE p.id = $1 AND p.company_id = $2
            RETURNING {}
            "#,
            column, PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(company_id)
        .bind(url)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::PhotoUpload,
            Some(product_id),
            json!({ "idmm": row.idmm, "hd": hd, "url": url }),
        )
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    pub async fn list_pargas(&self, company_id: Uuid, product_id: Uuid) -> AppResult<Vec<Parga>> {
        self.get(company_id, product_id).await?;

        let rows = sqlx::query_as::<_, PargaRow>(&format!(
            "SELECT {} FROM pargas WHERE product_id = $1 AND company_id = $2 ORDER BY number",
            PARGA_COLUMNS
        ))
        .bind(product_id)
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Parga::from).collect())
    }

    pub async fn get_parga(&self, company_id: Uuid, parga_id: Uuid) -> AppResult<Parga> {
        sqlx::query_as::<_, PargaRow>(&format!(
            "SELECT {} FROM pargas WHERE id = $1 AND company_id = $2",
            PARGA_COLUMNS
        ))
        .bind(parga_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .map(Parga::from)
        .ok_or_else(|| AppError::NotFound("Parga".to_string()))
    }

    pub async fn create_parga(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        product_id: Uuid,
        input: PargaInput,
    ) -> AppResult<Parga> {
        input.validate()?;
        let product = self.get(company_id, product_id).await?;
        let dimensions = resolve_dimensions(
            input.dimensions.as_deref(),
            input.length_cm,
            input.width_cm,
            input.thickness_cm,
        )?
        .unwrap_or_default();

        let mut tx = self.db.begin().await?;

        let number = match input.number {
            Some(n) => n,
            None => {
                sqlx::query_scalar::<_, i32>(
                    "SELECT COALESCE(MAX(number), 0) + 1 FROM pargas WHERE product_id = $1",
                )
                .bind(product_id)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM pargas WHERE product_id = $1 AND number = $2",
        )
        .bind(product_id)
        .bind(number)
        .fetch_one(&mut *tx)
        .await?;
        if taken > 0 {
            return Err(AppError::DuplicateEntry("number".to_string()));
        }

        let row = sqlx::query_as::<_, PargaRow>(&format!(
            r#"
            INSERT INTO pargas (company_id, product_id, number, slab_count, length_cm, width_cm, thickness_cm, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PARGA_COLUMNS
        ))
        .bind(company_id)
        .bind(product_id)
        .bind(number)
        .bind(input.slab_count)
        .bind(dimensions.length_cm)
        .bind(dimensions.width_cm)
        .bind(dimensions.thickness_cm)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::PargaCreate,
            Some(row.id),
            json!({ "idmm": product.idmm, "number": number }),
        )
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    pub async fn update_parga(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        parga_id: Uuid,
        input: PargaInput,
    ) -> AppResult<Parga> {
        input.validate()?;
        let dimensions = resolve_dimensions(
            input.dimensions.as_deref(),
            input.length_cm,
            input.width_cm,
            input.thickness_cm,
        )?
        .unwrap_or_default();

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, PargaRow>(&format!(
            r#"
            UPDATE pargas SET
                number = COALESCE($3, number),
                slab_count = COALESCE($4, slab_count),
                length_cm = COALESCE($5, length_cm),
                width_cm = COALESCE($6, width_cm),
                thickness_cm = COALESCE($7, thickness_cm),
                notes = COALESCE($8, notes),
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {}
            "#,
            PARGA_COLUMNS
        ))
        .bind(parga_id)
        .bind(company_id)
        .bind(input.number)
        .bind(input.slab_count)
        .bind(dimensions.length_cm)
        .bind(dimensions.width_cm)
        .bind(dimensions.thickness_cm)
        .bind(&input.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Parga".to_string()))?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::PargaUpdate,
            Some(parga_id),
            json!({ "number": row.number }),
        )
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    pub async fn delete_parga(&self, company_id: Uuid, user_id: Uuid, parga_id: Uuid) -> AppResult<()> {
        let parga = self.get_parga(company_id, parga_id).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM pargas WHERE id = $1 AND company_id = $2")
            .bind(parga_id)
            .bind(company_id)
            .execute(&mut *tx)
            .await?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::PargaDelete,
            Some(parga_id),
            json!({ "product_id": parga.product_id, "number": parga.number }),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn set_parga_photo_url(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        parga_id: Uuid,
        url: &str,
    ) -> AppResult<Parga> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, PargaRow>(&format!(
            r#"
            UPDATE pargas SET photo_url = $3, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {}
            "#,
            PARGA_COLUMNS
        ))
        .bind(parga_id)
        .bind(company_id)
        .bind(url)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Parga".to_string()))?;

        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::PhotoUpload,
            Some(parga_id),
            json!({ "parga": row.number, "url": url }),
        )
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }
}

const PRODUCT_FILTER: &str = r#"
    WHERE p.company_id = $1
      AND ($2::text IS NULL OR p.idmm ILIKE $2 OR p.variety ILIKE $2)
      AND ($3::text IS NULL OR p.kind = $3)
      AND ($4::uuid IS NULL OR EXISTS (
            SELECT 1 FROM stock s
            WHERE s.product_id = p.id AND s.location_id = $4 AND s.quantity > 0))
      AND ($5::bool IS NULL OR p.is_active = $5)
"#;

/// Fields of a product about to be inserted
pub(crate) struct NewProduct {
    pub idmm: String,
    pub variety: String,
    pub kind: ProductKind,
    pub finish: Option<String>,
    pub dimensions: Dimensions,
    pub unit: StockUnit,
    pub unit_price: Option<Decimal>,
    pub photo_url: Option<String>,
    pub photo_hd_url: Option<String>,
    pub notes: Option<String>,
}

/// Insert a product and its audit entry on the caller's transaction
pub(crate) async fn insert_product(
    conn: &mut PgConnection,
    company_id: Uuid,
    user_id: Uuid,
    new: NewProduct,
) -> AppResult<Product> {
    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM produtos WHERE company_id = $1 AND idmm = $2",
    )
    .bind(company_id)
    .bind(&new.idmm)
    .fetch_one(&mut *conn)
    .await?;
    if taken > 0 {
        return Err(AppError::DuplicateEntry("idmm".to_string()));
    }

    let row = sqlx::query_as::<_, ProductRow>(&format!(
        r#"
        INSERT INTO produtos AS p (company_id, idmm, variety, kind, finish, length_cm, width_cm,
                                   thickness_cm, unit, unit_price, photo_url, photo_hd_url, notes, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {}
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(company_id)
    .bind(&new.idmm)
    .bind(&new.variety)
    .bind(new.kind.as_str())
    .bind(&new.finish)
    .bind(new.dimensions.length_cm)
    .bind(new.dimensions.width_cm)
    .bind(new.dimensions.thickness_cm)
    .bind(new.unit.as_str())
    .bind(new.unit_price)
    .bind(&new.photo_url)
    .bind(&new.photo_hd_url)
    .bind(&new.notes)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    AuditService::record(
        &mut *conn,
        company_id,
        user_id,
        AuditAction::ProductCreate,
        Some(row.id),
        json!({ "idmm": row.idmm, "variety": row.variety }),
    )
    .await?;

    row.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_text_and_fields_combine() {
        let dims = resolve_dimensions(Some("300x200x2"), None, Some(Decimal::from(180)), None)
            .unwrap()
            .unwrap();
        assert_eq!(dims.length_cm, Some(Decimal::from(300)));
        assert_eq!(dims.width_cm, Some(Decimal::from(180)));
        assert_eq!(dims.thickness_cm, Some(Decimal::from(2)));

        assert!(resolve_dimensions(None, None, None, None).unwrap().is_none());
        assert!(resolve_dimensions(Some("abc"), None, None, None).is_err());
        assert!(resolve_dimensions(None, Some(Decimal::from(-1)), None, None).is_err());
    }

    #[test]
    fn stored_enums_parse() {
        let kind: ProductKind = parse_stored("slab").unwrap();
        assert_eq!(kind, ProductKind::Slab);
        assert!(parse_stored::<StockUnit>("litre").is_err());
    }
}
