use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::engine::{Material, MaterialId, MaterialStatus, RuleCatalog};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rule catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("material catalog is not valid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: column {column} has invalid value '{value}'")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
}

impl RuleCatalog {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

const SAMPLE_CATALOG: &str = include_str!("../../data/fence_catalog.json");

/// Built-in fence catalog used by the demo and when no rules path is configured.
pub fn sample_catalog() -> Result<RuleCatalog, CatalogError> {
    RuleCatalog::from_reader(SAMPLE_CATALOG.as_bytes())
}

/// Loads the JSON rule catalog and, when given, merges a material CSV export over it.
pub fn load_catalog(
    rules_path: impl AsRef<Path>,
    materials_csv: Option<&Path>,
) -> Result<RuleCatalog, CatalogError> {
    let mut catalog = RuleCatalog::from_path(rules_path.as_ref())?;
    if let Some(csv_path) = materials_csv {
        let materials = load_materials_csv(csv_path)?;
        info!(
            path = %csv_path.display(),
            materials = materials.len(),
            "merged material catalog"
        );
        catalog.merge_materials(materials);
    }
    Ok(catalog)
}

pub fn load_materials_csv(path: impl AsRef<Path>) -> Result<Vec<Material>, CatalogError> {
    let file = open(path.as_ref())?;
    read_materials_csv(file)
}

/// Parses a material export with columns `material_id,name,category,subcategory,
/// length_ft,unit_cost,status`. Blank cells are treated as absent.
pub fn read_materials_csv<R: Read>(reader: R) -> Result<Vec<Material>, CatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut materials = Vec::new();

    for (index, record) in csv_reader.deserialize::<MaterialRow>().enumerate() {
        let row = record?;
        // header is line 1
        materials.push(row.into_material(index + 2)?);
    }

    Ok(materials)
}

fn open(path: &Path) -> Result<File, CatalogError> {
    File::open(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct MaterialRow {
    material_id: String,
    name: String,
    category: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    subcategory: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    length_ft: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    unit_cost: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
}

impl MaterialRow {
    fn into_material(self, row: usize) -> Result<Material, CatalogError> {
        let length_ft = self
            .length_ft
            .map(|raw| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or(CatalogError::InvalidValue {
                        row,
                        column: "length_ft",
                        value: raw,
                    })
            })
            .transpose()?;
        let unit_cost = self
            .unit_cost
            .map(|raw| {
                Decimal::from_str(raw.trim_start_matches('$')).map_err(|_| {
                    CatalogError::InvalidValue {
                        row,
                        column: "unit_cost",
                        value: raw.clone(),
                    }
                })
            })
            .transpose()?;

        Ok(Material {
            material_id: MaterialId::from(self.material_id),
            name: self.name,
            category: self.category,
            subcategory: self.subcategory,
            length_ft,
            unit_cost,
            status: self
                .status
                .as_deref()
                .map(MaterialStatus::from_label)
                .unwrap_or_default(),
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
