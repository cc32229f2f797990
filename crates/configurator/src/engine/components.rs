use serde::{Deserialize, Serialize};

use super::domain::{ComponentCode, ComponentDefinition, ProductTypeCode, VariableContext};
use super::snapshot::RuleSnapshot;
use super::{product_rules, ResolutionError};

/// Component slot that applies to the requested configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveComponent {
    pub code: ComponentCode,
    pub name: String,
    pub display_order: i32,
    pub is_required: bool,
    pub is_optional: bool,
}

/// Active, visible components for a product type in display order.
pub fn resolve_components(
    snapshot: &RuleSnapshot,
    product_type: &ProductTypeCode,
    context: &VariableContext,
) -> Result<Vec<ActiveComponent>, ResolutionError> {
    let rules = product_rules(snapshot, product_type)?;

    let components = rules
        .assignments()
        .iter()
        .filter(|assignment| assignment.visibility.evaluate(context))
        .filter_map(|assignment| {
            let definition = snapshot.component(&assignment.component)?;
            if !definition.is_active || !passes_component_filter(definition, context) {
                return None;
            }
            Some(ActiveComponent {
                code: definition.code.clone(),
                name: definition.name.clone(),
                display_order: assignment.display_order,
                is_required: definition.is_required,
                is_optional: assignment.is_optional,
            })
        })
        .collect();

    Ok(components)
}

/// A declared `filter_attribute` without values places no constraint.
fn passes_component_filter(definition: &ComponentDefinition, context: &VariableContext) -> bool {
    match definition.filter_attribute.as_deref() {
        Some(attribute) if !definition.filter_values.is_empty() => context
            .get(attribute)
            .map(|value| {
                definition
                    .filter_values
                    .iter()
                    .any(|allowed| value.matches(allowed))
            })
            .unwrap_or(false),
        _ => true,
    }
}
