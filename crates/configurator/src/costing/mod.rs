//! Precomputed labor cost per product and business unit.

mod service;

pub use service::{CachedLaborCost, CostingError, LaborCostService};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::{
    resolve_labor_codes, BusinessUnitId, LaborCodeId, ProductDefinition, ProductId,
    ProductTypeCode, RuleSnapshot,
};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaborCostKey {
    pub product_type: ProductTypeCode,
    pub product_id: ProductId,
    pub business_unit_id: BusinessUnitId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaborCostLine {
    pub labor_code: LaborCodeId,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub extended: Decimal,
}

/// Cached labor cost for one product in one business unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedLaborCost {
    #[serde(flatten)]
    pub key: LaborCostKey,
    pub total_labor_cost: Decimal,
    pub labor_cost_per_unit: Decimal,
    pub lines: Vec<LaborCostLine>,
    /// Applicable labor codes with no rate in this business unit; excluded from the total.
    #[serde(default)]
    pub missing_rates: Vec<LaborCodeId>,
    pub calculated_at: DateTime<Utc>,
}

pub trait LaborCostCache: Send + Sync {
    fn upsert(&self, entry: PrecomputedLaborCost) -> Result<(), StoreError>;
    fn get(&self, key: &LaborCostKey) -> Result<Option<PrecomputedLaborCost>, StoreError>;
}

/// Sums rate times quantity over the labor codes that apply to the product's variables.
///
/// Labor codes not listed in `labor_quantities` count once. Zero `units_per_product`
/// reports the total as the per-unit cost. Amounts outside `Decimal` range are errors.
pub fn compute_labor_cost(
    snapshot: &RuleSnapshot,
    product: &ProductDefinition,
    business_unit_id: &BusinessUnitId,
    calculated_at: DateTime<Utc>,
) -> Result<PrecomputedLaborCost, CostingError> {
    let applicable = resolve_labor_codes(snapshot, &product.product_type, &product.variables)?;

    let mut lines = Vec::with_capacity(applicable.len());
    let mut missing_rates = Vec::new();
    for labor in applicable {
        let Some(rate) = snapshot.labor_rate(&labor.code, business_unit_id) else {
            missing_rates.push(labor.code);
            continue;
        };
        let quantity = product
            .labor_quantities
            .get(&labor.code)
            .copied()
            .unwrap_or(Decimal::ONE);
        let Some(extended) = rate.checked_mul(quantity) else {
            return Err(overflow(product, labor.code));
        };
        lines.push(LaborCostLine {
            labor_code: labor.code,
            quantity,
            rate,
            extended,
        });
    }

    let mut total_labor_cost = Decimal::ZERO;
    for line in &lines {
        total_labor_cost = total_labor_cost
            .checked_add(line.extended)
            .ok_or_else(|| overflow(product, line.labor_code.clone()))?;
    }
    let labor_cost_per_unit = if product.units_per_product.is_zero() {
        total_labor_cost
    } else {
        total_labor_cost
            .checked_div(product.units_per_product)
            .ok_or_else(|| CostingError::PerUnitOverflow {
                product_id: product.product_id.clone(),
            })?
            .round_dp(4)
    };

    Ok(PrecomputedLaborCost {
        key: LaborCostKey {
            product_type: product.product_type.clone(),
            product_id: product.product_id.clone(),
            business_unit_id: business_unit_id.clone(),
        },
        total_labor_cost,
        labor_cost_per_unit,
        lines,
        missing_rates,
        calculated_at,
    })
}

fn overflow(product: &ProductDefinition, labor_code: LaborCodeId) -> CostingError {
    CostingError::Overflow {
        product_id: product.product_id.clone(),
        labor_code,
    }
}

/// An entry computed before the last rule or rate change no longer reflects the rules.
pub fn is_stale(entry: &PrecomputedLaborCost, snapshot: &RuleSnapshot) -> bool {
    entry.calculated_at < snapshot.rules_changed_at()
}
