//! Spreadsheet import: preview and batched commit
//!
//! Rows are planned against a snapshot of products, stock and locations. Commit runs
//! batch by batch; each batch is one transaction, so a failing batch leaves the others
//! committed.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::audit::AuditService;
use super::location::LocationService;
use super::movement::{insert_movement, NewMovement};
use super::product::{insert_product, NewProduct};
use super::storage::StorageService;
use crate::config::ImportConfig;
use crate::error::{AppError, AppResult};
use shared::import::{
    parse_sheet_with_lines, ExistingProduct, ImportPlan, ImportPlanner, ImportSummary,
    LocationMatcher, PlannedAction, PlannedRow, RejectedRow,
};
use shared::storage::{
    extension_from_content_type, extension_from_filename, product_hd_key, product_photo_key, Bucket,
};
use shared::{AuditAction, MovementDraft, ProductKind};

#[derive(Clone)]
pub struct ImportService {
    db: PgPool,
    config: ImportConfig,
    storage: StorageService,
    http: reqwest::Client,
}

/// Header row and data rows as text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 1-based line in the file of each entry of `rows`
    pub lines: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct ImportPreview {
    pub filename: String,
    pub summary: ImportSummary,
    pub plan: ImportPlan,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub lines: Vec<usize>,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub batch_id: Uuid,
    pub summary: ImportSummary,
    pub committed_rows: usize,
    pub failed_rows: usize,
    pub rejected: Vec<RejectedRow>,
    pub failures: Vec<BatchFailure>,
    pub warnings: Vec<String>,
}

/// A photo URL to download once its row is committed
struct PendingPhoto {
    product_id: Uuid,
    idmm: String,
    url: String,
    hd: bool,
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Rows tagged with their 1-based file line; the first non-blank one is the header
fn split_header(rows: Vec<(usize, Vec<String>)>) -> AppResult<SheetData> {
    let mut rows = rows
        .into_iter()
        .skip_while(|(_, r)| r.iter().all(|c| c.trim().is_empty()));
    let Some((_, headers)) = rows.next() else {
        return Err(shared::import::ImportError::EmptySheet.into());
    };
    let (lines, rows): (Vec<usize>, Vec<Vec<String>>) = rows.unzip();
    Ok(SheetData {
        headers,
        rows,
        lines,
    })
}

/// Read the first worksheet of an Excel/ODS workbook
pub fn read_workbook(bytes: &[u8]) -> AppResult<SheetData> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(shared::import::ImportError::EmptySheet)??;

    // The range starts at the first used cell, not necessarily at A1
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or_default();
    let rows = range
        .rows()
        .enumerate()
        .map(|(i, r)| (first_row + i + 1, r.iter().map(cell_text).collect()))
        .collect();
    split_header(rows)
}

/// Read CSV with `,` or `;` separators
pub fn read_csv(bytes: &[u8]) -> AppResult<SheetData> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    let first_line = text.lines().next().unwrap_or_default();
    let delimiter = if first_line.matches(';').count() > first_line.matches(',').count() {
        b';'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(i + 1);
        rows.push((line, record.iter().map(|c| c.trim().to_string()).collect()));
    }
    split_header(rows)
}

/// Pick the reader from the file name, falling back to the zip signature
pub fn read_sheet(filename: &str, bytes: &[u8]) -> AppResult<SheetData> {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".csv") || lower.ends_with(".txt") {
        read_csv(bytes)
    } else if lower.ends_with(".xlsx")
        || lower.ends_with(".xlsm")
        || lower.ends_with(".xls")
        || lower.ends_with(".ods")
        || bytes.starts_with(b"PK")
    {
        read_workbook(bytes)
    } else {
        read_csv(bytes)
    }
}

fn photo_extension(url: &str, content_type: Option<&str>) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    extension_from_filename(path).or_else(|| content_type.and_then(extension_from_content_type))
}

impl ImportService {
    pub fn new(db: PgPool, config: ImportConfig, storage: StorageService) -> Self {
        Self {
            db,
            config,
            storage,
            http: reqwest::Client::new(),
        }
    }

    async fn snapshot(&self, company_id: Uuid) -> AppResult<Vec<ExistingProduct>> {
        let products = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, idmm, variety FROM produtos WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        let stock = sqlx::query_as::<_, (Uuid, Uuid, Decimal)>(
            "SELECT product_id, location_id, quantity FROM stock WHERE company_id = $1 AND quantity > 0",
        )
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(products
            .into_iter()
            .map(|(id, idmm, variety)| ExistingProduct {
                stock: stock
                    .iter()
                    .filter(|(product_id, _, _)| *product_id == id)
                    .map(|(_, location_id, quantity)| (*location_id, *quantity))
                    .collect(),
                id,
                idmm,
                variety,
            })
            .collect())
    }

    async fn plan(&self, company_id: Uuid, sheet: &SheetData) -> AppResult<ImportPlan> {
        let parsed = parse_sheet_with_lines(
            &sheet.headers,
            &sheet.rows,
            &sheet.lines,
            self.config.max_rows,
        )?;
        let products = self.snapshot(company_id).await?;
        let locations = LocationService::new(self.db.clone()).refs(company_id).await?;
        let matcher = LocationMatcher::with_threshold(&locations, self.config.fuzzy_threshold);

        Ok(ImportPlanner::new(&products, &matcher).plan(parsed))
    }

    /// Validate and plan a file without writing anything
    pub async fn preview(&self, company_id: Uuid, filename: &str, bytes: &[u8]) -> AppResult<ImportPreview> {
        let sheet = read_sheet(filename, bytes)?;
        let plan = self.plan(company_id, &sheet).await?;

        Ok(ImportPreview {
            filename: filename.to_string(),
            summary: plan.summary(),
            plan,
        })
    }

    pub async fn commit(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> AppResult<ImportResult> {
        let sheet = read_sheet(filename, bytes)?;
        let plan = self.plan(company_id, &sheet).await?;
        let summary = plan.summary();

        let batch_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO import_batches (company_id, filename, total_rows, rejected_rows, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(company_id)
        .bind(filename)
        .bind(summary.total_rows as i32)
        .bind(summary.rejected as i32)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let mut committed_rows = 0;
        let mut failed_rows = 0;
        let mut failures = Vec::new();
        let mut photos = Vec::new();

        for batch in plan.batches(self.config.batch_size) {
            match self.commit_batch(company_id, user_id, batch_id, batch).await {
                Ok(mut pending) => {
                    committed_rows += batch.len();
                    photos.append(&mut pending);
                }
                Err(e) => {
                    let lines: Vec<usize> = batch.iter().map(|r| r.line).collect();
                    tracing::warn!(
                        %company_id,
                        %batch_id,
                        first_line = lines.first().copied().unwrap_or_default(),
                        rows = lines.len(),
                        error = %e,
                        "import batch failed"
                    );
                    failed_rows += batch.len();
                    failures.push(BatchFailure {
                        lines,
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut warnings = plan.warnings.clone();
        if self.config.fetch_photos {
            for photo in photos {
                if let Err(e) = self.fetch_photo(company_id, user_id, &photo).await {
                    tracing::warn!(idmm = %photo.idmm, url = %photo.url, error = %e, "photo download failed");
                    warnings.push(format!("photo for '{}' could not be downloaded: {}", photo.idmm, e));
                }
            }
        }

        let details = json!({
            "filename": filename,
            "summary": summary,
            "committed_rows": committed_rows,
            "failed_rows": failed_rows,
        });

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            UPDATE import_batches SET committed_rows = $2, failed_rows = $3, summary = $4
            WHERE id = $1
            "#,
        )
        .bind(batch_id)
        .bind(committed_rows as i32)
        .bind(failed_rows as i32)
        .bind(&details)
        .execute(&mut *tx)
        .await?;
        AuditService::record(
            &mut *tx,
            company_id,
            user_id,
            AuditAction::ImportCommit,
            Some(batch_id),
            details,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            %company_id,
            %batch_id,
            committed_rows,
            failed_rows,
            rejected = summary.rejected,
            "import committed"
        );

        Ok(ImportResult {
            batch_id,
            summary,
            committed_rows,
            failed_rows,
            rejected: plan.rejected,
            failures,
            warnings,
        })
    }

    async fn commit_batch(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        batch_id: Uuid,
        rows: &[PlannedRow],
    ) -> AppResult<Vec<PendingPhoto>> {
        let mut tx = self.db.begin().await?;
        let mut photos = Vec::new();

        for planned in rows {
            let keep_urls = !self.config.fetch_photos;
            let product_id = upsert_product(&mut *tx, company_id, user_id, planned, keep_urls).await?;

            for movement in &planned.movements {
                insert_movement(
                    &mut *tx,
                    company_id,
                    user_id,
                    NewMovement {
                        draft: MovementDraft {
                            kind: movement.kind,
                            product_id,
                            origin_location_id: movement.origin_location_id,
                            destination_location_id: movement.destination_location_id,
                            quantity: movement.quantity,
                            customer_id: None,
                        },
                        reference: Some(movement.reference.clone()),
                        notes: Some(format!("Import line {}", planned.line)),
                        movement_date: None,
                        import_batch_id: Some(batch_id),
                    },
                )
                .await?;
            }

            for (url, hd) in [(&planned.row.photo_url, false), (&planned.row.photo_hd_url, true)] {
                if let Some(url) = url.as_ref().filter(|u| u.starts_with("http")) {
                    photos.push(PendingPhoto {
                        product_id,
                        idmm: planned.row.idmm.clone(),
                        url: url.clone(),
                        hd,
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(photos)
    }

    async fn fetch_photo(&self, company_id: Uuid, user_id: Uuid, photo: &PendingPhoto) -> AppResult<()> {
        let response = self
            .http
            .get(&photo.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::ExternalService(e.to_string()))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let ext = photo_extension(&photo.url, content_type.as_deref())
            .ok_or_else(|| AppError::ExternalService("URL is not a supported image".to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;

        let stored = if photo.hd {
            self.storage
                .put_new(Bucket::ProductsHd, |n| product_hd_key(&photo.idmm, ext, n), &bytes)
                .await?
        } else {
            self.storage
                .put_new(Bucket::Products, |n| product_photo_key(&photo.idmm, ext, n), &bytes)
                .await?
        };

        super::product::ProductService::new(self.db.clone())
            .set_photo_url(company_id, user_id, photo.product_id, &stored.url, photo.hd)
            .await?;
        Ok(())
    }
}

/// Create the product or update it from the row; returns its id
async fn upsert_product(
    conn: &mut PgConnection,
    company_id: Uuid,
    user_id: Uuid,
    planned: &PlannedRow,
    keep_photo_urls: bool,
) -> AppResult<Uuid> {
    let row = &planned.row;
    let (photo_url, photo_hd_url) = if keep_photo_urls {
        (row.photo_url.clone(), row.photo_hd_url.clone())
    } else {
        (None, None)
    };

    match planned.action {
        PlannedAction::Create => {
            let kind = row.kind.unwrap_or(ProductKind::Slab);
            let product = insert_product(
                &mut *conn,
                company_id,
                user_id,
                NewProduct {
                    idmm: row.idmm.clone(),
                    variety: row.variety.clone().unwrap_or_default(),
                    kind,
                    finish: row.finish.clone(),
                    dimensions: row.dimensions,
                    unit: row.unit.unwrap_or_else(|| kind.default_unit()),
                    unit_price: row.unit_price,
                    photo_url,
                    photo_hd_url,
                    notes: row.notes.clone(),
                },
            )
            .await?;
            Ok(product.id)
        }
        PlannedAction::Update { product_id } => {
            sqlx::query(
                r#"
                UPDATE produtos SET
                    variety = COALESCE($3, variety),
                    kind = COALESCE($4, kind),
                    finish = COALESCE($5, finish),
                    length_cm = COALESCE($6, length_cm),
                    width_cm = COALESCE($7, width_cm),
                    thickness_cm = COALESCE($8, thickness_cm),
                    unit = COALESCE($9, unit),
                    unit_price = COALESCE($10, unit_price),
                    photo_url = COALESCE($11, photo_url),
                    photo_hd_url = COALESCE($12, photo_hd_url),
                    notes = COALESCE($13, notes),
                    is_active = TRUE,
                    updated_at = NOW()
                WHERE id = $1 AND company_id = $2
                "#,
            )
            .bind(product_id)
            .bind(company_id)
            .bind(&row.variety)
            .bind(row.kind.map(|k| k.as_str()))
            .bind(&row.finish)
            .bind(row.dimensions.length_cm)
            .bind(row.dimensions.width_cm)
            .bind(row.dimensions.thickness_cm)
            .bind(row.unit.map(|u| u.as_str()))
            .bind(row.unit_price)
            .bind(&photo_url)
            .bind(&photo_hd_url)
            .bind(&row.notes)
            .execute(&mut *conn)
            .await?;

            AuditService::record(
                &mut *conn,
                company_id,
                user_id,
                AuditAction::ProductUpdate,
                Some(product_id),
                json!({ "idmm": row.idmm, "source": "import", "line": planned.line }),
            )
            .await?;

            Ok(product_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_with_semicolons_and_bom() {
        let data = "\u{feff}ID_MM;Localizacao;Quantidade\nMM1; P1 ;12,5\n\nMM2;P2;3\n";
        let sheet = read_sheet("stock.csv", data.as_bytes()).unwrap();

        assert_eq!(sheet.headers, vec!["ID_MM", "Localizacao", "Quantidade"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0], vec!["MM1", "P1", "12,5"]);
    }

    #[test]
    fn leading_blank_rows_are_skipped() {
        let sheet = read_csv(b",,\nID_MM,Localizacao\nMM1,P1\n").unwrap();
        assert_eq!(sheet.headers, vec!["ID_MM", "Localizacao"]);
        assert_eq!(sheet.rows, vec![vec!["MM1".to_string(), "P1".to_string()]]);
    }

    #[test]
    fn row_lines_follow_the_file() {
        let sheet = read_csv(b",,\n,,\nID_MM,Localizacao\n,P1\n\nMM2,\n").unwrap();
        let parsed =
            parse_sheet_with_lines(&sheet.headers, &sheet.rows, &sheet.lines, 100).unwrap();
        let lines: Vec<usize> = parsed.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![4, 6]);
        assert!(parsed.rows.iter().all(|r| !r.is_valid()));
    }

    #[test]
    fn workbook_lines_count_from_the_first_row() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(2, 0, "ID_MM").unwrap();
        sheet.write_string(2, 1, "Localizacao").unwrap();
        sheet.write_string(3, 0, "MM1").unwrap();
        sheet.write_string(3, 1, "P1").unwrap();
        sheet.write_string(5, 0, "MM2").unwrap();
        sheet.write_string(5, 1, "P2").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let sheet = read_workbook(&bytes).unwrap();
        assert_eq!(sheet.headers, vec!["ID_MM", "Localizacao"]);
        assert_eq!(sheet.lines, vec![4, 5, 6]);

        let parsed =
            parse_sheet_with_lines(&sheet.headers, &sheet.rows, &sheet.lines, 100).unwrap();
        let lines: Vec<usize> = parsed.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![4, 6]);
    }

    #[test]
    fn empty_files_are_rejected() {
        assert!(matches!(read_csv(b""), Err(AppError::Spreadsheet(_))));
    }

    #[test]
    fn photo_extensions() {
        assert_eq!(photo_extension("https://x.pt/a/MM1.JPEG?v=2", None), Some("jpg"));
        assert_eq!(photo_extension("https://x.pt/photo", Some("image/png")), Some("png"));
        assert_eq!(photo_extension("https://x.pt/photo", Some("text/html")), None);
    }
}
