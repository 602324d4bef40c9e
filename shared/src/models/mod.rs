//! Domain models for the Stone Stock platform

mod audit;
mod company;
mod customer;
mod location;
mod movement;
mod product;
mod stock;
mod user;

pub use audit::*;
pub use company::*;
pub use customer::*;
pub use location::*;
pub use movement::*;
pub use product::*;
pub use stock::*;
pub use user::*;

/// Error returned when a stored or submitted enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
