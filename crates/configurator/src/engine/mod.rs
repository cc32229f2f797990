//! Product configuration resolution: which components a build has, which materials are
//! legal for each, and which labor operations apply.
//!
//! Every resolver is a pure function of a [`RuleSnapshot`] and a [`VariableContext`]; the
//! [`ConfigurationEngine`] facade only adds snapshot acquisition from a rule store.

pub mod components;
pub mod domain;
pub mod eligibility;
pub mod expression;
pub mod labor;
mod service;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use components::{resolve_components, ActiveComponent};
pub use domain::{
    BusinessUnitId, ClientId, CommunityId, ComponentAssignment, ComponentCode,
    ComponentDefinition, EligibilityRuleRecord, LaborApplicabilityRule, LaborCode, LaborCodeId,
    LaborRate, Material, MaterialId, MaterialStatus, ProductDefinition, ProductId, ProductType,
    ProductTypeCode, RateSheetId, Scalar, SelectionMode, VariableContext,
};
pub use eligibility::{resolve_materials, EligibleMaterial};
pub use expression::{evaluate, Predicate, PredicateError};
pub use labor::{resolve_labor_codes, ApplicableLabor};
pub use service::{
    build_configuration, BuildConfiguration, ConfigurationEngine, ConfiguredComponent,
};
pub use snapshot::{
    validate, ConfigurationError, ConfigurationErrors, ProductRules, RuleCatalog, RuleSnapshot,
};

use crate::store::StoreError;

/// Failure to resolve, as opposed to a resolution that legitimately found nothing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolutionError {
    #[error("unknown product type {0}")]
    UnknownProductType(ProductTypeCode),
    #[error("product type {0} is inactive")]
    InactiveProductType(ProductTypeCode),
    #[error(transparent)]
    DataUnavailable(#[from] StoreError),
}

pub(crate) fn product_rules<'a>(
    snapshot: &'a RuleSnapshot,
    product_type: &ProductTypeCode,
) -> Result<&'a ProductRules, ResolutionError> {
    let rules = snapshot
        .product(product_type)
        .ok_or_else(|| ResolutionError::UnknownProductType(product_type.clone()))?;
    if !rules.product_type.is_active {
        return Err(ResolutionError::InactiveProductType(product_type.clone()));
    }
    Ok(rules)
}
