//! Route definitions for the Stone Stock platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes(state))
        // Stored files (public buckets open, private buckets signed)
        .route("/storage/:bucket/*key", get(handlers::get_object))
        // Protected routes
        .nest("/profile", profile_routes(state))
        .nest("/users", user_routes(state))
        .nest("/locations", location_routes(state))
        .nest("/customers", customer_routes(state))
        .nest("/products", product_routes(state))
        .nest("/pargas", parga_routes(state))
        .nest("/movements", movement_routes(state))
        .nest("/stock", stock_routes(state))
        .nest("/import", import_routes(state))
        .nest("/export", export_routes(state))
        .nest("/audit", audit_routes(state))
}

/// Authentication routes (public apart from logout)
fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/logout",
            post(handlers::logout)
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
}

fn profile_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/avatar", post(handlers::upload_avatar))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/:user_id",
            get(handlers::get_user).put(handlers::update_user),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn location_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_locations).post(handlers::create_location),
        )
        .route(
            "/:location_id",
            get(handlers::get_location)
                .put(handlers::update_location)
                .delete(handlers::delete_location),
        )
        .route("/:location_id/stock", get(handlers::get_location_stock))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn customer_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_customers).post(handlers::create_customer),
        )
        .route(
            "/:customer_id",
            get(handlers::get_customer)
                .put(handlers::update_customer)
                .delete(handlers::delete_customer),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn product_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/photo", post(handlers::upload_product_photo))
        .route("/:product_id/stock", get(handlers::get_product_stock))
        .route("/:product_id/movements", get(handlers::get_product_movements))
        .route(
            "/:product_id/pargas",
            get(handlers::list_pargas).post(handlers::create_parga),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn parga_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/:parga_id",
            put(handlers::update_parga).delete(handlers::delete_parga),
        )
        .route("/:parga_id/photo", post(handlers::upload_parga_photo))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn movement_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_movements).post(handlers::create_movement),
        )
        .route("/:movement_id", get(handlers::get_movement))
        .route("/:movement_id/cancel", post(handlers::cancel_movement))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn stock_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock))
        .route("/summary", get(handlers::stock_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn import_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/preview", post(handlers::preview_import))
        .route("/commit", post(handlers::commit_import))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn export_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/products", get(handlers::export_products))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn audit_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_audit))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
