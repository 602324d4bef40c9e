//! Business logic services for the Stone Stock platform

pub mod audit;
pub mod auth;
pub mod customer;
pub mod export;
pub mod import;
pub mod location;
pub mod movement;
pub mod product;
pub mod profile;
pub mod stock;
pub mod storage;
pub mod user;

pub use audit::AuditService;
pub use auth::AuthService;
pub use customer::CustomerService;
pub use export::ExportService;
pub use import::ImportService;
pub use location::LocationService;
pub use movement::MovementService;
pub use product::ProductService;
pub use profile::ProfileService;
pub use stock::StockService;
pub use storage::StorageService;
pub use user::UserService;
