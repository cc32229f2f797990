use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::info;

use super::{RuleStore, StoreError};
use crate::costing::{LaborCostCache, LaborCostKey, PrecomputedLaborCost};
use crate::engine::{
    BusinessUnitId, ClientId, CommunityId, ConfigurationError, RateSheetId, RuleCatalog,
    RuleSnapshot,
};
use crate::pricing::{
    BusinessUnit, Client, Community, PricingCatalog, RateSheet, RateSheetDirectory,
};

/// Rule store holding one compiled snapshot. Replacing it never disturbs resolutions that
/// already hold the previous snapshot.
pub struct InMemoryRuleStore {
    current: RwLock<Arc<RuleSnapshot>>,
}

impl InMemoryRuleStore {
    pub fn new(catalog: &RuleCatalog) -> Self {
        Self::from_snapshot(RuleSnapshot::compile(catalog))
    }

    pub fn from_snapshot(snapshot: RuleSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Compiles and publishes a new catalog, returning the rules that were quarantined.
    pub fn replace(&self, catalog: &RuleCatalog) -> Result<Vec<ConfigurationError>, StoreError> {
        let snapshot = RuleSnapshot::compile(catalog);
        let issues = snapshot.issues().to_vec();
        let mut guard = self
            .current
            .write()
            .map_err(|_| StoreError::Unavailable("rule store lock poisoned".to_string()))?;
        *guard = Arc::new(snapshot);
        info!(issues = issues.len(), "rule snapshot replaced");
        Ok(issues)
    }
}

impl RuleStore for InMemoryRuleStore {
    fn snapshot(&self) -> Result<Arc<RuleSnapshot>, StoreError> {
        let guard = self
            .current
            .read()
            .map_err(|_| StoreError::Unavailable("rule store lock poisoned".to_string()))?;
        Ok(guard.clone())
    }
}

/// Pricing scopes indexed by id.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRateSheetDirectory {
    communities: HashMap<CommunityId, Community>,
    clients: HashMap<ClientId, Client>,
    business_units: HashMap<BusinessUnitId, BusinessUnit>,
    rate_sheets: HashMap<RateSheetId, RateSheet>,
}

impl InMemoryRateSheetDirectory {
    pub fn new(catalog: &PricingCatalog) -> Self {
        Self {
            communities: catalog
                .communities
                .iter()
                .map(|community| (community.community_id.clone(), community.clone()))
                .collect(),
            clients: catalog
                .clients
                .iter()
                .map(|client| (client.client_id.clone(), client.clone()))
                .collect(),
            business_units: catalog
                .business_units
                .iter()
                .map(|unit| (unit.business_unit_id.clone(), unit.clone()))
                .collect(),
            rate_sheets: catalog
                .rate_sheets
                .iter()
                .map(|sheet| (sheet.rate_sheet_id.clone(), sheet.clone()))
                .collect(),
        }
    }
}

impl RateSheetDirectory for InMemoryRateSheetDirectory {
    fn community(&self, id: &CommunityId) -> Result<Option<Community>, StoreError> {
        Ok(self.communities.get(id).cloned())
    }

    fn client(&self, id: &ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.get(id).cloned())
    }

    fn business_unit(&self, id: &BusinessUnitId) -> Result<Option<BusinessUnit>, StoreError> {
        Ok(self.business_units.get(id).cloned())
    }

    fn rate_sheet(&self, id: &RateSheetId) -> Result<Option<RateSheet>, StoreError> {
        Ok(self.rate_sheets.get(id).cloned())
    }
}

/// Last write wins per key.
#[derive(Default, Clone)]
pub struct InMemoryLaborCostCache {
    entries: Arc<Mutex<HashMap<LaborCostKey, PrecomputedLaborCost>>>,
}

impl InMemoryLaborCostCache {
    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LaborCostCache for InMemoryLaborCostCache {
    fn upsert(&self, entry: PrecomputedLaborCost) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().map_err(|_| poisoned())?;
        guard.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn get(&self, key: &LaborCostKey) -> Result<Option<PrecomputedLaborCost>, StoreError> {
        let guard = self.entries.lock().map_err(|_| poisoned())?;
        Ok(guard.get(key).cloned())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("labor cost cache lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ProductType, ProductTypeCode};

    fn catalog(codes: &[&str]) -> RuleCatalog {
        RuleCatalog {
            product_types: codes
                .iter()
                .map(|code| ProductType {
                    code: ProductTypeCode::from(*code),
                    name: code.to_string(),
                    is_active: true,
                })
                .collect(),
            ..RuleCatalog::default()
        }
    }

    #[test]
    fn replace_leaves_held_snapshots_untouched() {
        let store = InMemoryRuleStore::new(&catalog(&["WOOD"]));
        let held = store.snapshot().expect("snapshot");

        let issues = store
            .replace(&catalog(&["WOOD", "VINYL"]))
            .expect("replace succeeds");
        assert!(issues.is_empty());

        assert_eq!(held.product_types().count(), 1);
        let current = store.snapshot().expect("snapshot");
        assert_eq!(current.product_types().count(), 2);
    }

    #[test]
    fn replace_reports_quarantined_rules() {
        let store = InMemoryRuleStore::new(&RuleCatalog::default());
        let mut next = catalog(&["WOOD"]);
        next.labor_rules.push(crate::engine::LaborApplicabilityRule {
            rule_id: Some("L-1".to_string()),
            product_type: ProductTypeCode::from("WOOD"),
            labor_code: "MISSING".into(),
            condition_formula: None,
            is_active: true,
        });

        let issues = store.replace(&next).expect("replace succeeds");
        assert_eq!(issues.len(), 1);
    }
}
