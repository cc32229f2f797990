use chrono::{TimeZone, Utc};
use serde_json::json;

use super::common::*;
use crate::engine::domain::{ComponentCode, LaborCodeId, MaterialId, ProductTypeCode};
use crate::engine::snapshot::{validate, ConfigurationError, RuleSnapshot};
use crate::engine::{resolve_labor_codes, resolve_materials};

#[test]
fn clean_catalog_validates() {
    assert_eq!(validate(&fence_catalog()), Ok(()));
    assert!(fence_snapshot().issues().is_empty());
}

#[test]
fn malformed_formula_is_quarantined_not_evaluated_false() {
    let mut catalog = fence_catalog();
    catalog
        .labor_rules
        .push(labor_rule("L-BROKEN", "SET-POST", Some("[height] >= 6")));

    let snapshot = RuleSnapshot::compile(&catalog);
    assert!(matches!(
        snapshot.issues(),
        [ConfigurationError::MalformedFormula { rule, .. }] if rule == "L-BROKEN"
    ));

    let labor = resolve_labor_codes(&snapshot, &wood(), &wood_six_foot()).expect("resolves");
    let set_post = labor
        .iter()
        .find(|labor| labor.code.as_str() == "SET-POST")
        .expect("healthy rule still applies");
    assert_eq!(set_post.matched_rules, vec!["L-SET".to_string()]);

    let errors = validate(&catalog).expect_err("strict validation fails");
    assert_eq!(errors.0.len(), 1);
}

#[test]
fn deeply_nested_formula_is_quarantined() {
    let formula = format!("{}[height] == 6{}", "(".repeat(5_000), ")".repeat(5_000));
    let mut catalog = fence_catalog();
    catalog
        .labor_rules
        .push(labor_rule("L-NESTED", "SET-POST", Some(&formula)));

    let snapshot = RuleSnapshot::compile(&catalog);
    assert!(matches!(
        snapshot.issues(),
        [ConfigurationError::MalformedFormula { rule, .. }] if rule == "L-NESTED"
    ));
}

#[test]
fn specific_rule_for_unknown_material_is_reported() {
    let mut catalog = fence_catalog();
    catalog
        .eligibility_rules
        .push(specific_rule("E-GHOST", "post", "POST-GHOST", 9));

    let errors = validate(&catalog).expect_err("unknown material");
    assert_eq!(
        errors.0,
        vec![ConfigurationError::UnknownMaterial {
            rule: "E-GHOST".to_string(),
            material_id: MaterialId::from("POST-GHOST"),
        }]
    );
}

#[test]
fn category_rule_without_category_is_reported() {
    let mut catalog = fence_catalog();
    let mut rule = category_rule("E-BLANK", "panel", "  ", None, 5);
    rule.attribute_filter = Some(json!({ "height": 4 }));
    catalog.eligibility_rules.push(rule);

    let errors = validate(&catalog).expect_err("blank category");
    assert!(matches!(
        errors.0.as_slice(),
        [ConfigurationError::MissingCategory { mode: "category", .. }]
    ));
}

#[test]
fn inverted_length_bounds_are_reported() {
    let mut catalog = fence_catalog();
    let mut rule = category_rule("E-INVERTED", "post", "Posts", None, 5);
    rule.min_length_ft = Some(10.0);
    rule.max_length_ft = Some(8.0);
    catalog.eligibility_rules.push(rule);

    let errors = validate(&catalog).expect_err("inverted bounds");
    assert!(matches!(
        errors.0.as_slice(),
        [ConfigurationError::InvertedLengthBounds { .. }]
    ));
}

#[test]
fn non_object_filters_are_invalid_predicates() {
    let mut catalog = fence_catalog();
    catalog.assignments[0].visibility_conditions = Some(json!(["STEEL"]));

    let errors = validate(&catalog).expect_err("array visibility");
    assert!(matches!(
        errors.0.as_slice(),
        [ConfigurationError::InvalidPredicate { .. }]
    ));
}

#[test]
fn references_to_unknown_entities_are_reported() {
    let mut catalog = fence_catalog();
    catalog
        .eligibility_rules
        .push(category_rule("E-ORPHAN", "kickboard", "Boards", None, 1));
    catalog
        .labor_rules
        .push(labor_rule("L-ORPHAN", "PAINT", None));
    let mut foreign = labor_rule("L-FOREIGN", "SET-POST", None);
    foreign.product_type = ProductTypeCode::from("ALUMINUM");
    catalog.labor_rules.push(foreign);

    let errors = validate(&catalog).expect_err("orphaned references");
    assert_eq!(
        errors.0,
        vec![
            ConfigurationError::UnknownComponent {
                rule: "E-ORPHAN".to_string(),
                component: ComponentCode::from("kickboard"),
            },
            ConfigurationError::UnknownLaborCode {
                rule: "L-ORPHAN".to_string(),
                labor_code: LaborCodeId::from("PAINT"),
            },
            ConfigurationError::UnknownProductType {
                rule: "L-FOREIGN".to_string(),
                product_type: ProductTypeCode::from("ALUMINUM"),
            },
        ]
    );
}

#[test]
fn duplicate_uniqueness_keys_keep_the_first_rule() {
    let mut catalog = fence_catalog();
    let mut duplicate = category_rule("E-PANEL-COPY", "panel", "Panels", None, 0);
    duplicate.attribute_filter = Some(json!({ "height": [6, 8] }));
    catalog.eligibility_rules.push(duplicate);

    let snapshot = RuleSnapshot::compile(&catalog);
    assert_eq!(
        snapshot.issues(),
        &[ConfigurationError::DuplicateRule {
            rule: "E-PANEL-COPY".to_string(),
            existing: "E-PANEL-TALL".to_string(),
        }]
    );

    let panels = resolve_materials(&snapshot, &wood(), &code("panel"), &wood_six_foot())
        .expect("resolves");
    assert!(panels.iter().all(|eligible| eligible.rule_id == "E-PANEL-TALL"));
}

#[test]
fn rules_changed_at_defaults_to_compile_time() {
    let compiled_at = Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap();
    let snapshot = RuleSnapshot::compile_at(&fence_catalog(), compiled_at);
    assert_eq!(snapshot.compiled_at(), compiled_at);
    assert_eq!(snapshot.rules_changed_at(), compiled_at);

    let mut catalog = fence_catalog();
    let changed = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
    catalog.rules_changed_at = Some(changed);
    let snapshot = RuleSnapshot::compile_at(&catalog, compiled_at);
    assert_eq!(snapshot.rules_changed_at(), changed);
}
