//! Product (produto) and parga models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;
use crate::validation::fold_accents;

/// Physical form of a stone product
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Block,
    Slab,
    Tile,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Block => "block",
            ProductKind::Slab => "slab",
            ProductKind::Tile => "tile",
        }
    }

    /// Label used in spreadsheets
    pub fn label_pt(&self) -> &'static str {
        match self {
            ProductKind::Block => "Bloco",
            ProductKind::Slab => "Chapa",
            ProductKind::Tile => "Ladrilho",
        }
    }

    /// Unit a product of this kind is counted in unless stated otherwise
    pub fn default_unit(&self) -> StockUnit {
        match self {
            ProductKind::Block => StockUnit::M3,
            ProductKind::Slab | ProductKind::Tile => StockUnit::M2,
        }
    }

    /// Lenient parse accepting Portuguese and English names, any case, with or without accents
    pub fn parse_loose(input: &str) -> Option<Self> {
        match fold_accents(input.trim()).to_lowercase().as_str() {
            "block" | "bloco" | "blocos" => Some(ProductKind::Block),
            "slab" | "chapa" | "chapas" => Some(ProductKind::Slab),
            "tile" | "ladrilho" | "ladrilhos" => Some(ProductKind::Tile),
            _ => None,
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(ProductKind::Block),
            "slab" => Ok(ProductKind::Slab),
            "tile" => Ok(ProductKind::Tile),
            other => Err(ParseEnumError::new("product kind", other)),
        }
    }
}

/// Unit stock quantities are counted in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StockUnit {
    M2,
    M3,
    Ton,
    Unit,
}

impl StockUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockUnit::M2 => "m2",
            StockUnit::M3 => "m3",
            StockUnit::Ton => "ton",
            StockUnit::Unit => "unit",
        }
    }

    pub fn parse_loose(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "m2" | "m²" | "mq" => Some(StockUnit::M2),
            "m3" | "m³" => Some(StockUnit::M3),
            "t" | "ton" | "tons" | "tonelada" | "toneladas" => Some(StockUnit::Ton),
            "un" | "un." | "unit" | "units" | "unidade" | "unidades" | "pc" | "pcs" => {
                Some(StockUnit::Unit)
            }
            _ => None,
        }
    }
}

impl fmt::Display for StockUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockUnit {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m2" => Ok(StockUnit::M2),
            "m3" => Ok(StockUnit::M3),
            "ton" => Ok(StockUnit::Ton),
            "unit" => Ok(StockUnit::Unit),
            other => Err(ParseEnumError::new("stock unit", other)),
        }
    }
}

/// Product dimensions in centimetres
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dimensions {
    pub length_cm: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub thickness_cm: Option<Decimal>,
}

impl Dimensions {
    pub fn is_empty(&self) -> bool {
        self.length_cm.is_none() && self.width_cm.is_none() && self.thickness_cm.is_none()
    }

    /// Face area in m², when length and width are known
    pub fn area_m2(&self) -> Option<Decimal> {
        Some(self.length_cm? * self.width_cm? / Decimal::from(10_000))
    }

    /// Volume in m³, when all three dimensions are known
    pub fn volume_m3(&self) -> Option<Decimal> {
        Some(self.length_cm? * self.width_cm? * self.thickness_cm? / Decimal::from(1_000_000))
    }

    /// Quantity implied by the dimensions for the given unit
    pub fn quantity_for(&self, unit: StockUnit) -> Option<Decimal> {
        match unit {
            StockUnit::M2 => self.area_m2(),
            StockUnit::M3 => self.volume_m3(),
            StockUnit::Ton | StockUnit::Unit => None,
        }
    }

    /// "L x W x T" with trailing zeros trimmed
    pub fn display(&self) -> Option<String> {
        let parts: Vec<String> = [self.length_cm, self.width_cm, self.thickness_cm]
            .iter()
            .flatten()
            .map(|d| d.normalize().to_string())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" x "))
        }
    }
}

/// A stone product instance identified by its IDMM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub company_id: Uuid,
    pub idmm: String,
    pub variety: String,
    pub kind: ProductKind,
    pub finish: Option<String>,
    #[serde(flatten)]
    pub dimensions: Dimensions,
    pub unit: StockUnit,
    pub unit_price: Option<Decimal>,
    pub photo_url: Option<String>,
    pub photo_hd_url: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sub-batch of slabs cut from the same block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parga {
    pub id: Uuid,
    pub company_id: Uuid,
    pub product_id: Uuid,
    pub number: i32,
    pub slab_count: Option<i32>,
    #[serde(flatten)]
    pub dimensions: Dimensions,
    pub photo_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
