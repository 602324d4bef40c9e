//! Fixed column schema of inventory spreadsheets

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ImportError;
use crate::validation::{fold_accents, LengthUnit};

/// Columns recognised in an inventory sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportColumn {
    Idmm,
    Location,
    Variety,
    Kind,
    Finish,
    Length,
    Width,
    Thickness,
    Dimensions,
    Quantity,
    Unit,
    Price,
    Photo,
    PhotoHd,
    Notes,
}

impl ImportColumn {
    /// Columns in export order
    pub const ALL: [ImportColumn; 15] = [
        ImportColumn::Idmm,
        ImportColumn::Location,
        ImportColumn::Variety,
        ImportColumn::Kind,
        ImportColumn::Finish,
        ImportColumn::Length,
        ImportColumn::Width,
        ImportColumn::Thickness,
        ImportColumn::Dimensions,
        ImportColumn::Quantity,
        ImportColumn::Unit,
        ImportColumn::Price,
        ImportColumn::Photo,
        ImportColumn::PhotoHd,
        ImportColumn::Notes,
    ];

    /// Canonical header text
    pub fn header(&self) -> &'static str {
        match self {
            ImportColumn::Idmm => "ID_MM",
            ImportColumn::Location => "Localizacao",
            ImportColumn::Variety => "Variedade",
            ImportColumn::Kind => "Tipo",
            ImportColumn::Finish => "Acabamento",
            ImportColumn::Length => "Comprimento",
            ImportColumn::Width => "Largura",
            ImportColumn::Thickness => "Altura",
            ImportColumn::Dimensions => "Dimensoes",
            ImportColumn::Quantity => "Quantidade",
            ImportColumn::Unit => "Unidade",
            ImportColumn::Price => "Preco",
            ImportColumn::Photo => "Foto",
            ImportColumn::PhotoHd => "Foto_HD",
            ImportColumn::Notes => "Observacoes",
        }
    }

    /// Accepted header spellings, already normalised
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            ImportColumn::Idmm => &["idmm", "codigo", "code"],
            ImportColumn::Location => &["localizacao", "local", "parque", "location"],
            ImportColumn::Variety => &["variedade", "variety", "material"],
            ImportColumn::Kind => &["tipo", "kind", "type"],
            ImportColumn::Finish => &["acabamento", "finish"],
            ImportColumn::Length => &["comprimento", "comp", "length"],
            ImportColumn::Width => &["largura", "larg", "width"],
            ImportColumn::Thickness => &["altura", "alt", "espessura", "esp", "thickness", "height"],
            ImportColumn::Dimensions => &["dimensoes", "dimensao", "dimensions", "medidas"],
            ImportColumn::Quantity => &["quantidade", "qtd", "qty", "quantity"],
            ImportColumn::Unit => &["unidade", "un", "unit"],
            ImportColumn::Price => &["preco", "precounitario", "price", "unitprice"],
            ImportColumn::Photo => &["foto", "fotourl", "photo", "photourl", "foto1"],
            ImportColumn::PhotoHd => &["fotohd", "photohd", "fotohdurl"],
            ImportColumn::Notes => &["observacoes", "obs", "notas", "notes"],
        }
    }

    fn is_length(&self) -> bool {
        matches!(
            self,
            ImportColumn::Length | ImportColumn::Width | ImportColumn::Thickness
        )
    }

    /// Match a header cell, returning the column and an optional unit hint such as "(mm)"
    pub fn from_header(header: &str) -> Option<(Self, Option<LengthUnit>)> {
        let normalized = normalize_header(header);
        if normalized.is_empty() {
            return None;
        }

        if let Some(column) = Self::ALL
            .iter()
            .find(|c| c.aliases().contains(&normalized.as_str()))
        {
            return Some((*column, None));
        }

        // Length headers may carry their unit: "Comprimento (mm)", "Largura cm"
        for suffix in ["mm", "cm", "m"] {
            if let Some(stem) = normalized.strip_suffix(suffix) {
                if let Some(column) = Self::ALL
                    .iter()
                    .find(|c| c.is_length() && c.aliases().contains(&stem))
                {
                    return Some((*column, LengthUnit::from_suffix(suffix)));
                }
            }
        }
        None
    }
}

/// Lowercase, fold accents and keep only ASCII alphanumerics
pub fn normalize_header(header: &str) -> String {
    fold_accents(header)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Position of each recognised column in a sheet
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    indices: HashMap<ImportColumn, usize>,
    units: HashMap<ImportColumn, LengthUnit>,
    /// Header cells that did not match any column
    pub unknown: Vec<String>,
}

impl HeaderMap {
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Result<Self, ImportError> {
        if headers.iter().all(|h| h.as_ref().trim().is_empty()) {
            return Err(ImportError::EmptySheet);
        }

        let mut map = HeaderMap::default();
        for (index, header) in headers.iter().enumerate() {
            let header = header.as_ref();
            if header.trim().is_empty() {
                continue;
            }
            match ImportColumn::from_header(header) {
                Some((column, unit)) => {
                    if map.indices.insert(column, index).is_some() {
                        return Err(ImportError::DuplicateColumn(column.header().to_string()));
                    }
                    if let Some(unit) = unit {
                        map.units.insert(column, unit);
                    }
                }
                None => map.unknown.push(header.trim().to_string()),
            }
        }

        for required in [ImportColumn::Idmm, ImportColumn::Location] {
            if !map.has(required) {
                return Err(ImportError::MissingColumn(required.header()));
            }
        }
        Ok(map)
    }

    pub fn has(&self, column: ImportColumn) -> bool {
        self.indices.contains_key(&column)
    }

    /// Trimmed, non-empty cell value for a column
    pub fn cell<'a, S: AsRef<str>>(&self, cells: &'a [S], column: ImportColumn) -> Option<&'a str> {
        let index = *self.indices.get(&column)?;
        cells
            .get(index)
            .map(|c| c.as_ref().trim())
            .filter(|c| !c.is_empty())
    }

    /// Unit declared in the header of a length column (centimetres when absent)
    pub fn unit(&self, column: ImportColumn) -> LengthUnit {
        self.units.get(&column).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_aliases() {
        assert_eq!(ImportColumn::from_header("ID_MM"), Some((ImportColumn::Idmm, None)));
        assert_eq!(
            ImportColumn::from_header(" Localização "),
            Some((ImportColumn::Location, None))
        );
        assert_eq!(
            ImportColumn::from_header("Espessura"),
            Some((ImportColumn::Thickness, None))
        );
        assert_eq!(
            ImportColumn::from_header("Comprimento (mm)"),
            Some((ImportColumn::Length, Some(LengthUnit::Millimetre)))
        );
        assert_eq!(ImportColumn::from_header("Cor"), None);
    }

    #[test]
    fn required_columns() {
        let err = HeaderMap::from_headers(&["ID_MM", "Variedade"]).unwrap_err();
        assert_eq!(err, ImportError::MissingColumn("Localizacao"));

        let err = HeaderMap::from_headers(&["ID_MM", "Local", "Parque"]).unwrap_err();
        assert_eq!(err, ImportError::DuplicateColumn("Localizacao".into()));

        let map = HeaderMap::from_headers(&["ID_MM", "Local", "Cor", ""]).unwrap();
        assert_eq!(map.unknown, vec!["Cor".to_string()]);
    }
}
