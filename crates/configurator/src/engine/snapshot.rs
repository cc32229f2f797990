use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{
    BusinessUnitId, ComponentAssignment, ComponentCode, ComponentDefinition, EligibilityRuleRecord,
    LaborApplicabilityRule, LaborCode, LaborCodeId, LaborRate, Material, MaterialId,
    ProductDefinition, ProductId, ProductType, ProductTypeCode, SelectionMode,
};
use super::expression::{AttributeFilter, Predicate, PredicateError};
use crate::pricing::PricingCatalog;

/// Rule tables as read from the store, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCatalog {
    #[serde(default)]
    pub product_types: Vec<ProductType>,
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
    #[serde(default)]
    pub assignments: Vec<ComponentAssignment>,
    #[serde(default)]
    pub eligibility_rules: Vec<EligibilityRuleRecord>,
    #[serde(default)]
    pub labor_codes: Vec<LaborCode>,
    #[serde(default)]
    pub labor_rules: Vec<LaborApplicabilityRule>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub labor_rates: Vec<LaborRate>,
    #[serde(default)]
    pub products: Vec<ProductDefinition>,
    #[serde(default)]
    pub pricing: PricingCatalog,
    /// Last administrative change to rules or rates; cached costs older than this are stale.
    #[serde(default)]
    pub rules_changed_at: Option<DateTime<Utc>>,
}

impl RuleCatalog {
    /// Adds or replaces materials by id, e.g. from a catalog CSV export.
    pub fn merge_materials(&mut self, materials: Vec<Material>) {
        for material in materials {
            match self
                .materials
                .iter_mut()
                .find(|existing| existing.material_id == material.material_id)
            {
                Some(existing) => *existing = material,
                None => self.materials.push(material),
            }
        }
    }
}

/// A rule the author has to fix. Offending rules are excluded from resolution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{rule}: malformed condition formula: {source}")]
    MalformedFormula {
        rule: String,
        #[source]
        source: PredicateError,
    },
    #[error("{rule}: invalid predicate: {source}")]
    InvalidPredicate {
        rule: String,
        #[source]
        source: PredicateError,
    },
    #[error("{rule}: {mode} rule requires a material category")]
    MissingCategory { rule: String, mode: &'static str },
    #[error("{rule}: specific rule requires a material id")]
    MissingMaterial { rule: String },
    #[error("{rule}: references unknown material {material_id}")]
    UnknownMaterial { rule: String, material_id: MaterialId },
    #[error("{rule}: min_length_ft {min} exceeds max_length_ft {max}")]
    InvertedLengthBounds { rule: String, min: f64, max: f64 },
    #[error("{rule}: references unknown component {component}")]
    UnknownComponent {
        rule: String,
        component: ComponentCode,
    },
    #[error("{rule}: references unknown labor code {labor_code}")]
    UnknownLaborCode {
        rule: String,
        labor_code: LaborCodeId,
    },
    #[error("{rule}: references unknown product type {product_type}")]
    UnknownProductType {
        rule: String,
        product_type: ProductTypeCode,
    },
    #[error("{rule}: duplicates {existing}")]
    DuplicateRule { rule: String, existing: String },
}

/// Every configuration error found in a catalog.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("rule catalog has {} configuration error(s)", .0.len())]
pub struct ConfigurationErrors(pub Vec<ConfigurationError>);

/// Strict validation for rule authors: any configuration error rejects the catalog.
pub fn validate(catalog: &RuleCatalog) -> Result<(), ConfigurationErrors> {
    let snapshot = RuleSnapshot::compile(catalog);
    if snapshot.issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationErrors(snapshot.issues))
    }
}

/// Inclusive length window for category rules.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LengthBounds {
    pub min_ft: Option<f64>,
    pub max_ft: Option<f64>,
}

impl LengthBounds {
    /// A material with no recorded length cannot satisfy a declared bound.
    pub fn contains(&self, length_ft: Option<f64>) -> bool {
        if self.min_ft.is_none() && self.max_ft.is_none() {
            return true;
        }
        let Some(length) = length_ft else {
            return false;
        };
        self.min_ft.map(|min| length >= min).unwrap_or(true)
            && self.max_ft.map(|max| length <= max).unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaterialSource {
    Category {
        category: String,
        subcategory: Option<String>,
        length: LengthBounds,
    },
    Specific {
        material_id: MaterialId,
    },
}

impl MaterialSource {
    /// Specific rules win ties against category rules at the same display order.
    fn specificity_rank(&self) -> u8 {
        match self {
            MaterialSource::Specific { .. } => 0,
            MaterialSource::Category { .. } => 1,
        }
    }

    pub(crate) fn admits(&self, material: &Material) -> bool {
        if !material.is_active() {
            return false;
        }
        match self {
            MaterialSource::Category {
                category,
                subcategory,
                length,
            } => {
                material.category == *category
                    && subcategory
                        .as_ref()
                        .map(|wanted| material.subcategory.as_ref() == Some(wanted))
                        .unwrap_or(true)
                    && length.contains(material.length_ft)
            }
            MaterialSource::Specific { material_id } => material.material_id == *material_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityRule {
    pub rule_id: String,
    pub source: MaterialSource,
    pub filter: AttributeFilter,
    pub display_order: i32,
    pub(crate) declared_at: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledAssignment {
    pub component: ComponentCode,
    pub display_order: i32,
    pub is_optional: bool,
    pub visibility: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaborRule {
    pub rule_id: String,
    pub labor_code: LaborCodeId,
    pub condition: Predicate,
}

/// Rules for one product type, read together so a resolution needs a single fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRules {
    pub product_type: ProductType,
    pub(crate) assignments: Vec<CompiledAssignment>,
    pub(crate) eligibility: BTreeMap<ComponentCode, Vec<EligibilityRule>>,
    pub(crate) labor: Vec<LaborRule>,
}

impl ProductRules {
    fn new(product_type: ProductType) -> Self {
        Self {
            product_type,
            assignments: Vec::new(),
            eligibility: BTreeMap::new(),
            labor: Vec::new(),
        }
    }

    /// Assignments ordered by display order, then declaration order.
    pub fn assignments(&self) -> &[CompiledAssignment] {
        &self.assignments
    }

    /// Eligibility rules for a component in precedence order.
    pub fn eligibility_rules(&self, component: &ComponentCode) -> &[EligibilityRule] {
        self.eligibility
            .get(component)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn labor_rules(&self) -> &[LaborRule] {
        &self.labor
    }
}

/// Immutable, validated view of the rule tables used for the duration of a resolution.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    compiled_at: DateTime<Utc>,
    rules_changed_at: DateTime<Utc>,
    products: BTreeMap<ProductTypeCode, ProductRules>,
    components: BTreeMap<ComponentCode, ComponentDefinition>,
    materials: BTreeMap<MaterialId, Material>,
    labor_codes: BTreeMap<LaborCodeId, LaborCode>,
    labor_rates: BTreeMap<(LaborCodeId, BusinessUnitId), Decimal>,
    product_definitions: BTreeMap<(ProductTypeCode, ProductId), ProductDefinition>,
    issues: Vec<ConfigurationError>,
}

impl RuleSnapshot {
    pub fn compile(catalog: &RuleCatalog) -> Self {
        Self::compile_at(catalog, Utc::now())
    }

    /// Compiles every rule, quarantining the invalid ones into `issues`.
    pub fn compile_at(catalog: &RuleCatalog, compiled_at: DateTime<Utc>) -> Self {
        let mut snapshot = Self {
            compiled_at,
            rules_changed_at: catalog.rules_changed_at.unwrap_or(compiled_at),
            products: BTreeMap::new(),
            components: BTreeMap::new(),
            materials: BTreeMap::new(),
            labor_codes: BTreeMap::new(),
            labor_rates: BTreeMap::new(),
            product_definitions: BTreeMap::new(),
            issues: Vec::new(),
        };

        for product_type in &catalog.product_types {
            snapshot.products.insert(
                product_type.code.clone(),
                ProductRules::new(product_type.clone()),
            );
        }
        for component in &catalog.components {
            snapshot
                .components
                .insert(component.code.clone(), component.clone());
        }
        for material in &catalog.materials {
            snapshot
                .materials
                .insert(material.material_id.clone(), material.clone());
        }
        for labor_code in &catalog.labor_codes {
            snapshot
                .labor_codes
                .insert(labor_code.code.clone(), labor_code.clone());
        }
        for rate in &catalog.labor_rates {
            snapshot.labor_rates.insert(
                (rate.labor_code.clone(), rate.business_unit_id.clone()),
                rate.rate,
            );
        }
        for product in &catalog.products {
            snapshot.product_definitions.insert(
                (product.product_type.clone(), product.product_id.clone()),
                product.clone(),
            );
        }

        snapshot.compile_assignments(&catalog.assignments);
        snapshot.compile_eligibility(&catalog.eligibility_rules);
        snapshot.compile_labor(&catalog.labor_rules);

        for issue in &snapshot.issues {
            warn!(error = %issue, "quarantined invalid rule");
        }
        debug!(
            product_types = snapshot.products.len(),
            materials = snapshot.materials.len(),
            issues = snapshot.issues.len(),
            "rule snapshot compiled"
        );

        snapshot
    }

    fn compile_assignments(&mut self, assignments: &[ComponentAssignment]) {
        let mut compiled = Vec::new();
        for (index, record) in assignments.iter().enumerate() {
            let rule = format!(
                "assignment {}/{}",
                record.product_type.as_str(),
                record.component.as_str()
            );
            if !self.known_product_type(&rule, &record.product_type)
                || !self.known_component(&rule, &record.component)
            {
                continue;
            }
            if !record.is_active {
                continue;
            }
            let visibility =
                match Predicate::attribute_filter(record.visibility_conditions.as_ref()) {
                    Ok(predicate) => predicate,
                    Err(source) => {
                        self.issues
                            .push(ConfigurationError::InvalidPredicate { rule, source });
                        continue;
                    }
                };
            compiled.push((
                index,
                record.product_type.clone(),
                CompiledAssignment {
                    component: record.component.clone(),
                    display_order: record.display_order,
                    is_optional: record.is_optional,
                    visibility,
                },
            ));
        }

        compiled.sort_by_key(|(index, _, assignment)| (assignment.display_order, *index));
        for (_, product_type, assignment) in compiled {
            if let Some(rules) = self.products.get_mut(&product_type) {
                rules.assignments.push(assignment);
            }
        }
    }

    fn compile_eligibility(&mut self, records: &[EligibilityRuleRecord]) {
        let mut seen: BTreeMap<UniquenessKey, String> = BTreeMap::new();

        for (index, record) in records.iter().enumerate() {
            let rule = record
                .rule_id
                .clone()
                .unwrap_or_else(|| format!("eligibility rule #{}", index + 1));
            if !self.known_product_type(&rule, &record.fence_type)
                || !self.known_component(&rule, &record.component)
            {
                continue;
            }

            let compiled = match self.compile_eligibility_rule(&rule, index, record) {
                Ok(compiled) => compiled,
                Err(issue) => {
                    self.issues.push(issue);
                    continue;
                }
            };

            let key = UniquenessKey::new(record, &compiled.filter);
            if let Some(existing) = seen.get(&key) {
                self.issues.push(ConfigurationError::DuplicateRule {
                    rule,
                    existing: existing.clone(),
                });
                continue;
            }
            seen.insert(key, rule);

            if !record.is_active {
                continue;
            }
            if let Some(rules) = self.products.get_mut(&record.fence_type) {
                rules
                    .eligibility
                    .entry(record.component.clone())
                    .or_default()
                    .push(compiled);
            }
        }

        for rules in self.products.values_mut() {
            for component_rules in rules.eligibility.values_mut() {
                component_rules.sort_by_key(|rule| {
                    (
                        rule.display_order,
                        rule.source.specificity_rank(),
                        rule.declared_at,
                    )
                });
            }
        }
    }

    fn compile_eligibility_rule(
        &self,
        rule: &str,
        index: usize,
        record: &EligibilityRuleRecord,
    ) -> Result<EligibilityRule, ConfigurationError> {
        let source = match record.selection_mode {
            SelectionMode::Category | SelectionMode::Subcategory => {
                let category = record
                    .material_category
                    .as_deref()
                    .map(str::trim)
                    .filter(|category| !category.is_empty())
                    .ok_or_else(|| ConfigurationError::MissingCategory {
                        rule: rule.to_string(),
                        mode: record.selection_mode.label(),
                    })?;
                if let (Some(min), Some(max)) = (record.min_length_ft, record.max_length_ft) {
                    if min > max {
                        return Err(ConfigurationError::InvertedLengthBounds {
                            rule: rule.to_string(),
                            min,
                            max,
                        });
                    }
                }
                MaterialSource::Category {
                    category: category.to_string(),
                    subcategory: record
                        .material_subcategory
                        .as_deref()
                        .map(str::trim)
                        .filter(|subcategory| !subcategory.is_empty())
                        .map(str::to_string),
                    length: LengthBounds {
                        min_ft: record.min_length_ft,
                        max_ft: record.max_length_ft,
                    },
                }
            }
            SelectionMode::Specific => {
                let material_id =
                    record
                        .material_id
                        .clone()
                        .ok_or_else(|| ConfigurationError::MissingMaterial {
                            rule: rule.to_string(),
                        })?;
                if !self.materials.contains_key(&material_id) {
                    return Err(ConfigurationError::UnknownMaterial {
                        rule: rule.to_string(),
                        material_id,
                    });
                }
                MaterialSource::Specific { material_id }
            }
        };

        let filter = match record.attribute_filter.as_ref() {
            Some(value) => AttributeFilter::from_json(value).map_err(|source| {
                ConfigurationError::InvalidPredicate {
                    rule: rule.to_string(),
                    source,
                }
            })?,
            None => AttributeFilter::default(),
        };

        Ok(EligibilityRule {
            rule_id: rule.to_string(),
            source,
            filter,
            display_order: record.display_order,
            declared_at: index,
        })
    }

    fn compile_labor(&mut self, records: &[LaborApplicabilityRule]) {
        for (index, record) in records.iter().enumerate() {
            let rule = record
                .rule_id
                .clone()
                .unwrap_or_else(|| format!("labor rule #{}", index + 1));
            if !self.known_product_type(&rule, &record.product_type) {
                continue;
            }
            if !self.labor_codes.contains_key(&record.labor_code) {
                self.issues.push(ConfigurationError::UnknownLaborCode {
                    rule,
                    labor_code: record.labor_code.clone(),
                });
                continue;
            }
            let condition = match Predicate::formula(record.condition_formula.as_deref()) {
                Ok(condition) => condition,
                Err(source) => {
                    self.issues
                        .push(ConfigurationError::MalformedFormula { rule, source });
                    continue;
                }
            };
            if !record.is_active {
                continue;
            }
            if let Some(rules) = self.products.get_mut(&record.product_type) {
                rules.labor.push(LaborRule {
                    rule_id: rule,
                    labor_code: record.labor_code.clone(),
                    condition,
                });
            }
        }
    }

    fn known_product_type(&mut self, rule: &str, product_type: &ProductTypeCode) -> bool {
        if self.products.contains_key(product_type) {
            return true;
        }
        self.issues.push(ConfigurationError::UnknownProductType {
            rule: rule.to_string(),
            product_type: product_type.clone(),
        });
        false
    }

    fn known_component(&mut self, rule: &str, component: &ComponentCode) -> bool {
        if self.components.contains_key(component) {
            return true;
        }
        self.issues.push(ConfigurationError::UnknownComponent {
            rule: rule.to_string(),
            component: component.clone(),
        });
        false
    }

    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    pub fn rules_changed_at(&self) -> DateTime<Utc> {
        self.rules_changed_at
    }

    pub fn issues(&self) -> &[ConfigurationError] {
        &self.issues
    }

    pub fn product(&self, code: &ProductTypeCode) -> Option<&ProductRules> {
        self.products.get(code)
    }

    pub fn product_types(&self) -> impl Iterator<Item = &ProductType> {
        self.products.values().map(|rules| &rules.product_type)
    }

    pub fn component(&self, code: &ComponentCode) -> Option<&ComponentDefinition> {
        self.components.get(code)
    }

    pub fn material(&self, id: &MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Materials in identity order.
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    pub fn labor_code(&self, code: &LaborCodeId) -> Option<&LaborCode> {
        self.labor_codes.get(code)
    }

    pub fn labor_rate(
        &self,
        code: &LaborCodeId,
        business_unit: &BusinessUnitId,
    ) -> Option<Decimal> {
        self.labor_rates
            .get(&(code.clone(), business_unit.clone()))
            .copied()
    }

    pub fn product_definition(
        &self,
        product_type: &ProductTypeCode,
        product_id: &ProductId,
    ) -> Option<&ProductDefinition> {
        self.product_definitions
            .get(&(product_type.clone(), product_id.clone()))
    }

    pub fn product_definitions(&self) -> impl Iterator<Item = &ProductDefinition> {
        self.product_definitions.values()
    }
}

/// (fence_type, component, category, subcategory, material, attribute_filter).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct UniquenessKey {
    fence_type: ProductTypeCode,
    component: ComponentCode,
    category: Option<String>,
    subcategory: Option<String>,
    material: Option<MaterialId>,
    filter: String,
}

impl UniquenessKey {
    fn new(record: &EligibilityRuleRecord, filter: &AttributeFilter) -> Self {
        let specific = record.selection_mode == SelectionMode::Specific;
        Self {
            fence_type: record.fence_type.clone(),
            component: record.component.clone(),
            category: record.material_category.clone().filter(|_| !specific),
            subcategory: record.material_subcategory.clone().filter(|_| !specific),
            material: record.material_id.clone().filter(|_| specific),
            filter: filter.canonical_key(),
        }
    }
}
