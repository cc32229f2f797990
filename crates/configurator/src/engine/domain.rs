use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

identifier!(
    /// Code of a manufactured configuration family, e.g. `wood-vertical`.
    ProductTypeCode
);
identifier!(
    /// Code of a part slot within a build, e.g. `post-cap`.
    ComponentCode
);
identifier!(
    /// Catalog identity of a purchasable material (SKU).
    MaterialId
);
identifier!(
    /// Code of a labor operation, e.g. `SET-POST`.
    LaborCodeId
);
identifier!(ProductId);
identifier!(CommunityId);
identifier!(ClientId);
identifier!(BusinessUnitId);
identifier!(RateSheetId);

/// Scalar assigned to a configuration variable.
///
/// Comparisons are deliberately loose across representations: `6`, `6.0`, and `"6"` are
/// equal, and `true` equals `"true"`. Text comparison is case-sensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Text(left), Scalar::Text(right)) => left == right,
            (Scalar::Number(left), Scalar::Number(right)) => left == right,
            (Scalar::Bool(left), Scalar::Bool(right)) => left == right,
            (Scalar::Number(number), Scalar::Text(text))
            | (Scalar::Text(text), Scalar::Number(number)) => text
                .trim()
                .parse::<f64>()
                .map(|parsed| parsed == *number)
                .unwrap_or(false),
            (Scalar::Bool(flag), Scalar::Text(text)) | (Scalar::Text(text), Scalar::Bool(flag)) => {
                text.trim()
                    .eq_ignore_ascii_case(if *flag { "true" } else { "false" })
            }
            _ => false,
        }
    }

    /// Converts a JSON scalar; `null`, arrays, and objects have no scalar form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(flag) => Some(Scalar::Bool(*flag)),
            serde_json::Value::Number(number) => number.as_f64().map(Scalar::Number),
            serde_json::Value::String(text) => Some(Scalar::Text(text.clone())),
            _ => None,
        }
    }

    /// Interprets free text the way a person typing `height=6` on a command line means it.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(number) = trimmed.parse::<f64>() {
            return Scalar::Number(number);
        }
        match trimmed {
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            _ => Scalar::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(number) => Some(*number),
            Scalar::Text(text) => text.trim().parse().ok(),
            Scalar::Bool(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(flag) => write!(f, "{flag}"),
            Scalar::Number(number) => write!(f, "{number}"),
            Scalar::Text(text) => write!(f, "\"{text}\""),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(f64::from(value))
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Named variable assignments supplied with each resolution call. Keys are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableContext(BTreeMap<String, Scalar>);

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Scalar>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for VariableContext
where
    K: Into<String>,
    V: Into<Scalar>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut context = Self::new();
        for (name, value) in iter {
            context.insert(name, value);
        }
        context
    }
}

pub(crate) fn default_true() -> bool {
    true
}

fn default_units() -> Decimal {
    Decimal::ONE
}

/// A configuration family with its own component and labor rule sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductType {
    pub code: ProductTypeCode,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub code: ComponentCode,
    pub name: String,
    #[serde(default)]
    pub is_required: bool,
    /// Variable whose value must be one of `filter_values` for the component to apply.
    #[serde(default)]
    pub filter_attribute: Option<String>,
    #[serde(default)]
    pub filter_values: Vec<Scalar>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentAssignment {
    pub product_type: ProductTypeCode,
    pub component: ComponentCode,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub is_optional: bool,
    /// Conjunctive JSON predicate: variable name to allowed values.
    #[serde(default)]
    pub visibility_conditions: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Category,
    Subcategory,
    Specific,
}

impl SelectionMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Specific => "specific",
        }
    }
}

/// Eligibility rule as stored. Compiled into a typed rule by the snapshot builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRuleRecord {
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(alias = "product_type")]
    pub fence_type: ProductTypeCode,
    pub component: ComponentCode,
    pub selection_mode: SelectionMode,
    #[serde(default)]
    pub material_category: Option<String>,
    #[serde(default)]
    pub material_subcategory: Option<String>,
    #[serde(default)]
    pub material_id: Option<MaterialId>,
    #[serde(default)]
    pub min_length_ft: Option<f64>,
    #[serde(default)]
    pub max_length_ft: Option<f64>,
    #[serde(default)]
    pub attribute_filter: Option<serde_json::Value>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialStatus {
    #[default]
    #[serde(alias = "Active")]
    Active,
    #[serde(alias = "Inactive")]
    Inactive,
    #[serde(alias = "Discontinued")]
    Discontinued,
}

impl MaterialStatus {
    /// Unrecognized labels never make a material eligible.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "" | "active" => Self::Active,
            "discontinued" => Self::Discontinued,
            _ => Self::Inactive,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
            Self::Discontinued => "Discontinued",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub material_id: MaterialId,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub length_ft: Option<f64>,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    pub status: MaterialStatus,
}

impl Material {
    pub fn is_active(&self) -> bool {
        self.status == MaterialStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaborCode {
    pub code: LaborCodeId,
    pub name: String,
    /// Unit the labor is billed in (each, linear foot, ...).
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaborApplicabilityRule {
    #[serde(default)]
    pub rule_id: Option<String>,
    pub product_type: ProductTypeCode,
    pub labor_code: LaborCodeId,
    /// Boolean formula such as `[height] == 6 AND [rail_count] == 3`; blank means always.
    #[serde(default)]
    pub condition_formula: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaborRate {
    pub labor_code: LaborCodeId,
    pub business_unit_id: BusinessUnitId,
    pub rate: Decimal,
}

/// A concrete sellable product whose labor cost can be precomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDefinition {
    pub product_type: ProductTypeCode,
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub variables: VariableContext,
    /// Units (e.g. linear feet) delivered by one product, used for per-unit cost.
    #[serde(default = "default_units")]
    pub units_per_product: Decimal,
    /// Quantity per labor code; codes not listed count once.
    #[serde(default)]
    pub labor_quantities: BTreeMap<LaborCodeId, Decimal>,
}
