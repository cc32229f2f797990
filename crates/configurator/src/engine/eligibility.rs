use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{ComponentCode, Material, MaterialId, ProductTypeCode, VariableContext};
use super::snapshot::{EligibilityRule, MaterialSource, RuleSnapshot};
use super::{product_rules, ResolutionError};

/// Candidate material together with the rule it was admitted through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleMaterial {
    #[serde(flatten)]
    pub material: Material,
    pub rule_id: String,
    pub display_order: i32,
}

/// Legal materials for a component, ordered by the winning rule's display order and then
/// by material id.
///
/// Rules are visited in precedence order (display order, specific before category,
/// declaration order) after their attribute filter has been checked, and the first rule to
/// admit a material owns it. A material reachable through several rules therefore appears
/// once, attributed to the first-declared rule.
pub fn resolve_materials(
    snapshot: &RuleSnapshot,
    product_type: &ProductTypeCode,
    component: &ComponentCode,
    context: &VariableContext,
) -> Result<Vec<EligibleMaterial>, ResolutionError> {
    let rules = product_rules(snapshot, product_type)?;

    let mut claimed: BTreeSet<MaterialId> = BTreeSet::new();
    let mut eligible = Vec::new();

    for rule in rules.eligibility_rules(component) {
        if !rule.filter.matches(context) {
            continue;
        }
        for material in expand(snapshot, rule) {
            if claimed.insert(material.material_id.clone()) {
                eligible.push(EligibleMaterial {
                    material: material.clone(),
                    rule_id: rule.rule_id.clone(),
                    display_order: rule.display_order,
                });
            }
        }
    }

    eligible.sort_by(|left, right| {
        left.display_order
            .cmp(&right.display_order)
            .then_with(|| left.material.material_id.cmp(&right.material.material_id))
    });

    Ok(eligible)
}

fn expand<'a>(
    snapshot: &'a RuleSnapshot,
    rule: &'a EligibilityRule,
) -> Box<dyn Iterator<Item = &'a Material> + 'a> {
    match &rule.source {
        MaterialSource::Specific { material_id } => Box::new(
            snapshot
                .material(material_id)
                .filter(|material| rule.source.admits(material))
                .into_iter(),
        ),
        MaterialSource::Category { .. } => Box::new(
            snapshot
                .materials()
                .filter(move |material| rule.source.admits(material)),
        ),
    }
}
