//! Rate-sheet selection and material pricing.

mod cascade;

pub use cascade::{resolve_rate_sheet, RateSheetResolution, RateSheetResolver, RateSheetSource};

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::domain::{
    BusinessUnitId, ClientId, CommunityId, Material, MaterialId, RateSheetId,
};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub community_id: CommunityId,
    /// Client the community belongs to, used when no client is given explicitly.
    #[serde(default)]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub rate_sheet_id: Option<RateSheetId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: ClientId,
    #[serde(default)]
    pub default_rate_sheet_id: Option<RateSheetId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessUnit {
    pub business_unit_id: BusinessUnitId,
    #[serde(default)]
    pub default_rate_sheet_id: Option<RateSheetId>,
}

/// Named price list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSheet {
    pub rate_sheet_id: RateSheetId,
    pub name: String,
    #[serde(default)]
    pub items: BTreeMap<MaterialId, Decimal>,
}

/// Pricing scopes and sheets as stored alongside the rule tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingCatalog {
    #[serde(default)]
    pub communities: Vec<Community>,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub business_units: Vec<BusinessUnit>,
    #[serde(default)]
    pub rate_sheets: Vec<RateSheet>,
}

/// Read access to the three rate-sheet scopes and the sheets themselves.
pub trait RateSheetDirectory: Send + Sync {
    fn community(&self, id: &CommunityId) -> Result<Option<Community>, StoreError>;
    fn client(&self, id: &ClientId) -> Result<Option<Client>, StoreError>;
    fn business_unit(&self, id: &BusinessUnitId) -> Result<Option<BusinessUnit>, StoreError>;
    fn rate_sheet(&self, id: &RateSheetId) -> Result<Option<RateSheet>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rate_sheet_id", rename_all = "snake_case")]
pub enum PriceBasis {
    RateSheet(RateSheetId),
    RawCost,
    Unpriced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedMaterial {
    pub material_id: MaterialId,
    pub unit_price: Decimal,
    pub basis: PriceBasis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Prices a material from the sheet, falling back to raw cost when the sheet is missing
/// or does not list it. The fallback is a supported degraded mode and carries a warning.
pub fn price_material(sheet: Option<&RateSheet>, material: &Material) -> PricedMaterial {
    if let Some(sheet) = sheet {
        if let Some(price) = sheet.items.get(&material.material_id) {
            return PricedMaterial {
                material_id: material.material_id.clone(),
                unit_price: *price,
                basis: PriceBasis::RateSheet(sheet.rate_sheet_id.clone()),
                warning: None,
            };
        }
    }

    let reason = match sheet {
        Some(sheet) => format!("not listed on rate sheet {}", sheet.rate_sheet_id),
        None => "no rate sheet resolved".to_string(),
    };

    match material.unit_cost {
        Some(cost) => PricedMaterial {
            material_id: material.material_id.clone(),
            unit_price: cost,
            basis: PriceBasis::RawCost,
            warning: Some(format!("{reason}; priced at raw cost")),
        },
        None => PricedMaterial {
            material_id: material.material_id.clone(),
            unit_price: Decimal::ZERO,
            basis: PriceBasis::Unpriced,
            warning: Some(format!("{reason}; material has no cost on file")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::domain::MaterialStatus;
    use rust_decimal::Decimal;

    fn material(id: &str, cost: Option<Decimal>) -> Material {
        Material {
            material_id: MaterialId::from(id),
            name: id.to_string(),
            category: "Posts".to_string(),
            subcategory: None,
            length_ft: Some(8.0),
            unit_cost: cost,
            status: MaterialStatus::Active,
        }
    }

    fn sheet() -> RateSheet {
        let mut items = BTreeMap::new();
        items.insert(MaterialId::from("POST-8"), Decimal::new(2450, 2));
        RateSheet {
            rate_sheet_id: RateSheetId::from("RS-RETAIL"),
            name: "Retail".to_string(),
            items,
        }
    }

    #[test]
    fn listed_items_use_sheet_price() {
        let priced = price_material(Some(&sheet()), &material("POST-8", Some(Decimal::TEN)));
        assert_eq!(priced.unit_price, Decimal::new(2450, 2));
        assert_eq!(
            priced.basis,
            PriceBasis::RateSheet(RateSheetId::from("RS-RETAIL"))
        );
        assert!(priced.warning.is_none());
    }

    #[test]
    fn unlisted_items_fall_back_to_raw_cost_with_warning() {
        let priced = price_material(Some(&sheet()), &material("RAIL-8", Some(Decimal::TEN)));
        assert_eq!(priced.unit_price, Decimal::TEN);
        assert_eq!(priced.basis, PriceBasis::RawCost);
        assert!(priced
            .warning
            .as_deref()
            .is_some_and(|warning| warning.contains("RS-RETAIL")));
    }

    #[test]
    fn no_sheet_and_no_cost_is_unpriced() {
        let priced = price_material(None, &material("CAP", None));
        assert_eq!(priced.unit_price, Decimal::ZERO);
        assert_eq!(priced.basis, PriceBasis::Unpriced);
        assert!(priced.warning.is_some());
    }
}
