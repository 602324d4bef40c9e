//! Product and parga handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::storage::{parga_photo_key, product_hd_key, product_photo_key, Bucket};
use shared::types::{PaginatedResponse, Pagination};
use shared::{Action, MovementStatus, Parga, Product, ProductKind, Resource, StockEntry};
use uuid::Uuid;

use super::{image_extension, read_upload};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::movement::{MovementDetails, MovementFilter};
use crate::services::product::{
    CreateProductInput, PargaInput, ProductFilter, ProductListItem, UpdateProductInput,
};
use crate::services::{MovementService, ProductService, StockService, StorageService};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub search: Option<String>,
    pub kind: Option<ProductKind>,
    pub location_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PhotoQuery {
    #[serde(default)]
    pub hd: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductMovementsQuery {
    pub status: Option<MovementStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Product with a time-limited link to its HD photo
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_hd_signed_url: Option<String>,
}

fn product_view(storage: &StorageService, product: Product) -> Result<ProductView, AppError> {
    let photo_hd_signed_url = match &product.photo_hd_url {
        Some(url) => storage.sign_stored_url(url)?,
        None => None,
    };
    Ok(ProductView {
        product,
        photo_hd_signed_url,
    })
}

pub async fn list_products(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<PaginatedResponse<ProductListItem>>, AppError> {
    user.require(Resource::Product, Action::View)?;

    let filter = ProductFilter {
        search: query.search,
        kind: query.kind,
        location_id: query.location_id,
        is_active: query.is_active,
    };
    let pagination = Pagination::new(query.page, query.per_page);

    let service = ProductService::new(state.db.clone());
    Ok(Json(service.list(user.company_id, &filter, pagination).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductView>, AppError> {
    user.require(Resource::Product, Action::View)?;

    let service = ProductService::new(state.db.clone());
    let product = service.get(user.company_id, product_id).await?;
    let storage = StorageService::new(&state.config.storage);
    Ok(Json(product_view(&storage, product)?))
}

pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    user.require(Resource::Product, Action::Create)?;

    let service = ProductService::new(state.db.clone());
    let product = service.create(user.company_id, user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> Result<Json<Product>, AppError> {
    user.require(Resource::Product, Action::Edit)?;

    let service = ProductService::new(state.db.clone());
    Ok(Json(
        service
            .update(user.company_id, user.user_id, product_id, input)
            .await?,
    ))
}

pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Resource::Product, Action::Delete)?;

    let service = ProductService::new(state.db.clone());
    service.delete(user.company_id, user.user_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload the product photo, or the HD original with `?hd=true`
pub async fn upload_product_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(query): Query<PhotoQuery>,
    multipart: Multipart,
) -> Result<Json<ProductView>, AppError> {
    user.require(Resource::Product, Action::Edit)?;

    let service = ProductService::new(state.db.clone());
    let product = service.get(user.company_id, product_id).await?;

    let upload = read_upload(multipart, state.config.storage.max_upload_bytes).await?;
    let ext = image_extension(&upload)?;

    let storage = StorageService::new(&state.config.storage);
    let stored = if query.hd {
        storage
            .put_new(Bucket::ProductsHd, |n| product_hd_key(&product.idmm, ext, n), &upload.bytes)
            .await?
    } else {
        storage
            .put_new(Bucket::Products, |n| product_photo_key(&product.idmm, ext, n), &upload.bytes)
            .await?
    };

    let product = service
        .set_photo_url(user.company_id, user.user_id, product_id, &stored.url, query.hd)
        .await?;
    Ok(Json(product_view(&storage, product)?))
}

pub async fn get_product_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<StockEntry>>, AppError> {
    user.require(Resource::Stock, Action::View)?;

    ProductService::new(state.db.clone())
        .get(user.company_id, product_id)
        .await?;
    let service = StockService::new(state.db.clone());
    Ok(Json(service.for_product(user.company_id, product_id).await?))
}

pub async fn get_product_movements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(query): Query<ProductMovementsQuery>,
) -> Result<Json<PaginatedResponse<MovementDetails>>, AppError> {
    user.require(Resource::Movement, Action::View)?;

    let filter = MovementFilter {
        product_id: Some(product_id),
        status: query.status,
        ..Default::default()
    };
    let pagination = Pagination::new(query.page, query.per_page);

    let service = MovementService::new(state.db.clone());
    Ok(Json(service.list(user.company_id, &filter, pagination).await?))
}

pub async fn list_pargas(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<Parga>>, AppError> {
    user.require(Resource::Product, Action::View)?;

    let service = ProductService::new(state.db.clone());
    Ok(Json(service.list_pargas(user.company_id, product_id).await?))
}

pub async fn create_parga(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<PargaInput>,
) -> Result<(StatusCode, Json<Parga>), AppError> {
    user.require(Resource::Product, Action::Edit)?;

    let service = ProductService::new(state.db.clone());
    let parga = service
        .create_parga(user.company_id, user.user_id, product_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(parga)))
}

pub async fn update_parga(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parga_id): Path<Uuid>,
    Json(input): Json<PargaInput>,
) -> Result<Json<Parga>, AppError> {
    user.require(Resource::Product, Action::Edit)?;

    let service = ProductService::new(state.db.clone());
    Ok(Json(
        service
            .update_parga(user.company_id, user.user_id, parga_id, input)
            .await?,
    ))
}

pub async fn delete_parga(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parga_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Resource::Product, Action::Edit)?;

    let service = ProductService::new(state.db.clone());
    service
        .delete_parga(user.company_id, user.user_id, parga_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_parga_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parga_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Parga>, AppError> {
    user.require(Resource::Product, Action::Edit)?;

    let service = ProductService::new(state.db.clone());
    let parga = service.get_parga(user.company_id, parga_id).await?;
    let product = service.get(user.company_id, parga.product_id).await?;

    let upload = read_upload(multipart, state.config.storage.max_upload_bytes).await?;
    let ext = image_extension(&upload)?;

    let storage = StorageService::new(&state.config.storage);
    let stored = storage
        .put_new(
            Bucket::Products,
            |n| parga_photo_key(&product.idmm, parga.number, ext, n),
            &upload.bytes,
        )
        .await?;

    Ok(Json(
        service
            .set_parga_photo_url(user.company_id, user.user_id, parga_id, &stored.url)
            .await?,
    ))
}
