//! Shared types and domain logic for the stone stock platform
//!
//! Used by the backend and by the browser through the WASM bindings.

pub mod import;
pub mod ledger;
pub mod models;
pub mod storage;
pub mod types;
pub mod validation;

pub use ledger::*;
pub use models::*;
pub use types::*;
pub use validation::*;
