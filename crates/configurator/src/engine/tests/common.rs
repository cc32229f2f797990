use serde_json::{json, Value};

use crate::engine::domain::{
    ComponentAssignment, ComponentCode, ComponentDefinition, EligibilityRuleRecord,
    LaborApplicabilityRule, LaborCode, LaborCodeId, Material, MaterialId, MaterialStatus,
    ProductType, ProductTypeCode, Scalar, SelectionMode, VariableContext,
};
use crate::engine::snapshot::{RuleCatalog, RuleSnapshot};

pub(super) const WOOD: &str = "WOOD";
pub(super) const RETIRED: &str = "RETIRED";

pub(super) fn wood() -> ProductTypeCode {
    ProductTypeCode::from(WOOD)
}

pub(super) fn code(value: &str) -> ComponentCode {
    ComponentCode::from(value)
}

pub(super) fn product_type(code: &str, is_active: bool) -> ProductType {
    ProductType {
        code: ProductTypeCode::from(code),
        name: format!("{code} fence"),
        is_active,
    }
}

pub(super) fn component(code: &str, is_required: bool) -> ComponentDefinition {
    ComponentDefinition {
        code: ComponentCode::from(code),
        name: code.replace('-', " "),
        is_required,
        filter_attribute: None,
        filter_values: Vec::new(),
        is_active: true,
    }
}

pub(super) fn assignment(
    component: &str,
    display_order: i32,
    visibility: Option<Value>,
) -> ComponentAssignment {
    ComponentAssignment {
        product_type: wood(),
        component: ComponentCode::from(component),
        display_order,
        is_optional: false,
        visibility_conditions: visibility,
        is_active: true,
    }
}

pub(super) fn material(
    id: &str,
    category: &str,
    subcategory: Option<&str>,
    length_ft: Option<f64>,
) -> Material {
    Material {
        material_id: MaterialId::from(id),
        name: id.to_string(),
        category: category.to_string(),
        subcategory: subcategory.map(str::to_string),
        length_ft,
        unit_cost: None,
        status: MaterialStatus::Active,
    }
}

pub(super) fn category_rule(
    rule_id: &str,
    component: &str,
    category: &str,
    subcategory: Option<&str>,
    display_order: i32,
) -> EligibilityRuleRecord {
    EligibilityRuleRecord {
        rule_id: Some(rule_id.to_string()),
        fence_type: wood(),
        component: ComponentCode::from(component),
        selection_mode: if subcategory.is_some() {
            SelectionMode::Subcategory
        } else {
            SelectionMode::Category
        },
        material_category: Some(category.to_string()),
        material_subcategory: subcategory.map(str::to_string),
        material_id: None,
        min_length_ft: None,
        max_length_ft: None,
        attribute_filter: None,
        display_order,
        is_active: true,
    }
}

pub(super) fn specific_rule(
    rule_id: &str,
    component: &str,
    material_id: &str,
    display_order: i32,
) -> EligibilityRuleRecord {
    EligibilityRuleRecord {
        rule_id: Some(rule_id.to_string()),
        fence_type: wood(),
        component: ComponentCode::from(component),
        selection_mode: SelectionMode::Specific,
        material_category: None,
        material_subcategory: None,
        material_id: Some(MaterialId::from(material_id)),
        min_length_ft: None,
        max_length_ft: None,
        attribute_filter: None,
        display_order,
        is_active: true,
    }
}

pub(super) fn labor_code(code: &str) -> LaborCode {
    LaborCode {
        code: LaborCodeId::from(code),
        name: code.to_lowercase().replace('-', " "),
        unit: Some("each".to_string()),
        is_active: true,
    }
}

pub(super) fn labor_rule(
    rule_id: &str,
    code: &str,
    formula: Option<&str>,
) -> LaborApplicabilityRule {
    LaborApplicabilityRule {
        rule_id: Some(rule_id.to_string()),
        product_type: wood(),
        labor_code: LaborCodeId::from(code),
        condition_formula: formula.map(str::to_string),
        is_active: true,
    }
}

/// A wood privacy fence with posts, panels, an optional cap, and a steel-only bracket.
pub(super) fn fence_catalog() -> RuleCatalog {
    let mut post_cap = component("post-cap", false);
    post_cap.filter_attribute = Some("post_type".to_string());
    post_cap.filter_values = vec![Scalar::from("WOOD")];

    let mut gate_latch = component("gate-latch", false);
    gate_latch.is_active = false;

    let mut cap_assignment = assignment("post-cap", 3, None);
    cap_assignment.is_optional = true;

    let mut retired_post = material("POST-4X4-10", "Posts", Some("Wood"), Some(10.0));
    retired_post.status = MaterialStatus::Discontinued;

    let mut wood_posts = category_rule("E-POST-WOOD", "post", "Posts", Some("Wood"), 1);
    wood_posts.min_length_ft = Some(8.0);
    wood_posts.attribute_filter = Some(json!({ "post_type": "WOOD" }));

    let mut featured_post = specific_rule("E-POST-FEATURED", "post", "POST-4X4-8", 2);
    featured_post.attribute_filter = Some(json!({ "post_type": "WOOD" }));

    let mut steel_posts = category_rule("E-POST-STEEL", "post", "Posts", Some("Steel"), 3);
    steel_posts.attribute_filter = Some(json!({ "post_type": ["STEEL"] }));

    let mut tall_panels = category_rule("E-PANEL-TALL", "panel", "Panels", None, 1);
    tall_panels.attribute_filter = Some(json!({ "height": [6, 8] }));

    RuleCatalog {
        product_types: vec![product_type(WOOD, true), product_type(RETIRED, false)],
        components: vec![
            component("post", true),
            component("panel", true),
            post_cap,
            component("steel-bracket", false),
            gate_latch,
        ],
        assignments: vec![
            assignment("panel", 2, None),
            assignment("post", 1, None),
            cap_assignment,
            assignment(
                "steel-bracket",
                4,
                Some(json!({ "post_type": ["STEEL"] })),
            ),
            assignment("gate-latch", 5, None),
        ],
        eligibility_rules: vec![
            wood_posts,
            featured_post,
            steel_posts,
            tall_panels,
            specific_rule("E-CAP", "post-cap", "CAP-FLAT", 1),
            specific_rule("E-BRACKET", "steel-bracket", "BRACKET-S", 1),
        ],
        materials: vec![
            material("POST-4X4-6", "Posts", Some("Wood"), Some(6.0)),
            material("POST-4X4-8", "Posts", Some("Wood"), Some(8.0)),
            material("POST-6X6-8", "Posts", Some("Wood"), Some(8.0)),
            retired_post,
            material("POST-STEEL-8", "Posts", Some("Steel"), Some(8.0)),
            material("PANEL-6X8", "Panels", Some("Privacy"), Some(8.0)),
            material("PANEL-8X8", "Panels", Some("Privacy"), Some(8.0)),
            material("CAP-FLAT", "Caps", None, None),
            material("BRACKET-S", "Hardware", Some("Bracket"), None),
        ],
        labor_codes: vec![
            labor_code("SET-POST"),
            labor_code("HANG-PANEL-6"),
            labor_code("HANG-PANEL-8"),
            labor_code("CAP-INSTALL"),
            LaborCode {
                is_active: false,
                ..labor_code("TEAR-OUT")
            },
        ],
        labor_rules: vec![
            labor_rule("L-SET", "SET-POST", None),
            labor_rule(
                "L-HANG-6-3",
                "HANG-PANEL-6",
                Some("[height] == 6 AND [rail_count] == 3"),
            ),
            labor_rule(
                "L-HANG-6-2",
                "HANG-PANEL-6",
                Some("[height] == 6 AND [rail_count] == 2"),
            ),
            labor_rule("L-HANG-8", "HANG-PANEL-8", Some("[height] == 8")),
            labor_rule("L-CAP", "CAP-INSTALL", Some("[post_type] == \"WOOD\"")),
            labor_rule("L-TEAR", "TEAR-OUT", None),
        ],
        ..RuleCatalog::default()
    }
}

pub(super) fn fence_snapshot() -> RuleSnapshot {
    RuleSnapshot::compile(&fence_catalog())
}

pub(super) fn context(pairs: &[(&str, Scalar)]) -> VariableContext {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub(super) fn wood_six_foot() -> VariableContext {
    context(&[
        ("post_type", Scalar::from("WOOD")),
        ("height", Scalar::from(6)),
        ("rail_count", Scalar::from(3)),
    ])
}

pub(super) fn ids<'a>(items: impl IntoIterator<Item = &'a MaterialId>) -> Vec<&'a str> {
    items.into_iter().map(MaterialId::as_str).collect()
}
