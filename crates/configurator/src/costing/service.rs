use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::{compute_labor_cost, is_stale, LaborCostCache, LaborCostKey, PrecomputedLaborCost};
use crate::engine::{
    BusinessUnitId, LaborCodeId, ProductId, ProductTypeCode, ResolutionError, RuleSnapshot,
};
use crate::store::StoreError;

/// Cached entry with its staleness against the snapshot it was read under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedLaborCost {
    #[serde(flatten)]
    pub entry: PrecomputedLaborCost,
    pub stale: bool,
}

/// Recomputes labor costs and keeps the cache current.
pub struct LaborCostService<C> {
    cache: Arc<C>,
}

impl<C> Clone for LaborCostService<C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<C> LaborCostService<C>
where
    C: LaborCostCache + 'static,
{
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    pub fn recompute(
        &self,
        snapshot: &RuleSnapshot,
        product_type: &ProductTypeCode,
        product_id: &ProductId,
        business_unit_id: &BusinessUnitId,
    ) -> Result<PrecomputedLaborCost, CostingError> {
        let product = snapshot
            .product_definition(product_type, product_id)
            .ok_or_else(|| CostingError::UnknownProduct {
                product_type: product_type.clone(),
                product_id: product_id.clone(),
            })?;

        let entry = compute_labor_cost(snapshot, product, business_unit_id, Utc::now())?;
        self.cache.upsert(entry.clone())?;

        info!(
            product_type = %product_type,
            product_id = %product_id,
            business_unit = %business_unit_id,
            total = %entry.total_labor_cost,
            missing_rates = entry.missing_rates.len(),
            "labor cost recomputed"
        );

        Ok(entry)
    }

    /// Recomputes every product definition in the snapshot for one business unit.
    pub fn recompute_all(
        &self,
        snapshot: &RuleSnapshot,
        business_unit_id: &BusinessUnitId,
    ) -> Result<Vec<PrecomputedLaborCost>, CostingError> {
        snapshot
            .product_definitions()
            .map(|product| {
                self.recompute(
                    snapshot,
                    &product.product_type,
                    &product.product_id,
                    business_unit_id,
                )
            })
            .collect()
    }

    pub fn cached(
        &self,
        snapshot: &RuleSnapshot,
        key: &LaborCostKey,
    ) -> Result<Option<CachedLaborCost>, CostingError> {
        Ok(self.cache.get(key)?.map(|entry| CachedLaborCost {
            stale: is_stale(&entry, snapshot),
            entry,
        }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CostingError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("no product definition {product_id} for product type {product_type}")]
    UnknownProduct {
        product_type: ProductTypeCode,
        product_id: ProductId,
    },
    #[error("labor cost for product {product_id} overflowed at labor code {labor_code}")]
    Overflow {
        product_id: ProductId,
        labor_code: LaborCodeId,
    },
    #[error("per-unit labor cost for product {product_id} overflowed")]
    PerUnitOverflow { product_id: ProductId },
    #[error(transparent)]
    Cache(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        LaborApplicabilityRule, LaborCode, LaborCodeId, LaborRate, ProductDefinition,
        ProductType, RuleCatalog, VariableContext,
    };
    use crate::store::InMemoryLaborCostCache;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn catalog() -> RuleCatalog {
        RuleCatalog {
            product_types: vec![ProductType {
                code: ProductTypeCode::from("CHAIN"),
                name: "Chain link".to_string(),
                is_active: true,
            }],
            labor_codes: vec![LaborCode {
                code: LaborCodeId::from("STRETCH"),
                name: "Stretch fabric".to_string(),
                unit: Some("lf".to_string()),
                is_active: true,
            }],
            labor_rules: vec![LaborApplicabilityRule {
                rule_id: None,
                product_type: ProductTypeCode::from("CHAIN"),
                labor_code: LaborCodeId::from("STRETCH"),
                condition_formula: None,
                is_active: true,
            }],
            labor_rates: vec![LaborRate {
                labor_code: LaborCodeId::from("STRETCH"),
                business_unit_id: BusinessUnitId::from("south"),
                rate: Decimal::new(325, 2),
            }],
            products: vec![ProductDefinition {
                product_type: ProductTypeCode::from("CHAIN"),
                product_id: ProductId::from("CHAIN-4-10"),
                name: "4ft chain link, 10ft roll".to_string(),
                variables: VariableContext::new(),
                units_per_product: Decimal::from(10),
                labor_quantities: BTreeMap::new(),
            }],
            ..RuleCatalog::default()
        }
    }

    fn key() -> LaborCostKey {
        LaborCostKey {
            product_type: ProductTypeCode::from("CHAIN"),
            product_id: ProductId::from("CHAIN-4-10"),
            business_unit_id: BusinessUnitId::from("south"),
        }
    }

    #[test]
    fn recompute_upserts_entry() {
        let snapshot = RuleSnapshot::compile(&catalog());
        let cache = Arc::new(InMemoryLaborCostCache::default());
        let service = LaborCostService::new(cache.clone());

        let entry = service
            .recompute(
                &snapshot,
                &ProductTypeCode::from("CHAIN"),
                &ProductId::from("CHAIN-4-10"),
                &BusinessUnitId::from("south"),
            )
            .expect("recompute succeeds");
        assert_eq!(entry.total_labor_cost, Decimal::new(325, 2));

        service
            .recompute(
                &snapshot,
                &ProductTypeCode::from("CHAIN"),
                &ProductId::from("CHAIN-4-10"),
                &BusinessUnitId::from("south"),
            )
            .expect("recompute succeeds");
        assert_eq!(cache.len(), 1);

        let cached = service
            .cached(&snapshot, &key())
            .expect("cache readable")
            .expect("entry present");
        assert!(!cached.stale);
    }

    #[test]
    fn rule_change_marks_cached_entry_stale() {
        let snapshot = RuleSnapshot::compile(&catalog());
        let service = LaborCostService::new(Arc::new(InMemoryLaborCostCache::default()));
        service
            .recompute_all(&snapshot, &BusinessUnitId::from("south"))
            .expect("recompute succeeds");

        let mut changed = catalog();
        changed.rules_changed_at = Some(Utc::now() + Duration::minutes(5));
        let changed = RuleSnapshot::compile(&changed);

        let cached = service
            .cached(&changed, &key())
            .expect("cache readable")
            .expect("entry present");
        assert!(cached.stale);
    }

    #[test]
    fn unknown_product_is_reported() {
        let snapshot = RuleSnapshot::compile(&catalog());
        let service = LaborCostService::new(Arc::new(InMemoryLaborCostCache::default()));
        let err = service
            .recompute(
                &snapshot,
                &ProductTypeCode::from("CHAIN"),
                &ProductId::from("NOPE"),
                &BusinessUnitId::from("south"),
            )
            .expect_err("no such product");
        assert!(matches!(err, CostingError::UnknownProduct { .. }));
    }
}
