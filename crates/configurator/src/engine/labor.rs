use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{LaborCodeId, ProductTypeCode, VariableContext};
use super::snapshot::RuleSnapshot;
use super::{product_rules, ResolutionError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicableLabor {
    pub code: LaborCodeId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Rules whose formula held; any one of them is enough.
    pub matched_rules: Vec<String>,
}

/// Labor codes applicable to a configuration, ordered by code.
///
/// Closed world: a code is included only when one of its rules for this product type
/// evaluates true. Inactive labor codes never apply.
pub fn resolve_labor_codes(
    snapshot: &RuleSnapshot,
    product_type: &ProductTypeCode,
    context: &VariableContext,
) -> Result<Vec<ApplicableLabor>, ResolutionError> {
    let rules = product_rules(snapshot, product_type)?;
    let mut applicable: BTreeMap<LaborCodeId, ApplicableLabor> = BTreeMap::new();

    for rule in rules.labor_rules() {
        let Some(labor_code) = snapshot
            .labor_code(&rule.labor_code)
            .filter(|code| code.is_active)
        else {
            continue;
        };
        if !rule.condition.evaluate(context) {
            continue;
        }
        applicable
            .entry(labor_code.code.clone())
            .or_insert_with(|| ApplicableLabor {
                code: labor_code.code.clone(),
                name: labor_code.name.clone(),
                unit: labor_code.unit.clone(),
                matched_rules: Vec::new(),
            })
            .matched_rules
            .push(rule.rule_id.clone());
    }

    Ok(applicable.into_values().collect())
}
