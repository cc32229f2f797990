use std::collections::BTreeMap;

use serde_json::Value;

use super::PredicateError;
use crate::engine::domain::{Scalar, VariableContext};

/// Conjunctive attribute filter: every listed variable must hold one of its allowed values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeFilter {
    constraints: BTreeMap<String, Vec<Scalar>>,
}

impl AttributeFilter {
    /// Accepts `null`, or an object whose values are a scalar or a list of scalars.
    pub fn from_json(value: &Value) -> Result<Self, PredicateError> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(PredicateError::FilterNotObject {
                    found: json_kind(other),
                })
            }
        };

        let mut constraints = BTreeMap::new();
        for (key, allowed) in object {
            let invalid = || PredicateError::FilterValue { key: key.clone() };
            let values = match allowed {
                Value::Array(items) => items
                    .iter()
                    .map(|item| Scalar::from_json(item).ok_or_else(invalid))
                    .collect::<Result<Vec<_>, _>>()?,
                single => vec![Scalar::from_json(single).ok_or_else(invalid)?],
            };
            constraints.insert(key.clone(), values);
        }

        Ok(Self { constraints })
    }

    pub fn matches(&self, context: &VariableContext) -> bool {
        self.constraints.iter().all(|(key, allowed)| {
            context
                .get(key)
                .map(|value| allowed.iter().any(|candidate| value.matches(candidate)))
                .unwrap_or(false)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Stable textual identity, equal for filters that constrain the same values.
    pub fn canonical_key(&self) -> String {
        self.constraints
            .iter()
            .map(|(key, values)| {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                format!("{key}=[{}]", rendered.join(","))
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn singleton_values_are_one_element_lists() {
        let single = AttributeFilter::from_json(&json!({"post_type": "STEEL"})).expect("valid");
        let listed = AttributeFilter::from_json(&json!({"post_type": ["STEEL"]})).expect("valid");
        assert_eq!(single, listed);
        assert_eq!(single.canonical_key(), listed.canonical_key());
    }

    #[test]
    fn every_key_must_match() {
        let filter = AttributeFilter::from_json(&json!({
            "post_type": ["STEEL", "ALUMINUM"],
            "height": [6, 8]
        }))
        .expect("valid");

        let context = VariableContext::new()
            .with("post_type", "STEEL")
            .with("height", 8);
        assert!(filter.matches(&context));

        let wrong_height = context.clone().with("height", 7);
        assert!(!filter.matches(&wrong_height));

        let missing_height = VariableContext::new().with("post_type", "STEEL");
        assert!(!filter.matches(&missing_height));
    }

    #[test]
    fn empty_filters_accept_everything() {
        let filter = AttributeFilter::from_json(&json!({})).expect("valid");
        assert!(filter.is_empty());
        assert!(filter.matches(&VariableContext::new()));
    }

    #[test]
    fn rejects_non_object_shapes() {
        assert!(matches!(
            AttributeFilter::from_json(&json!(["STEEL"])),
            Err(PredicateError::FilterNotObject { found: "array" })
        ));
        assert!(matches!(
            AttributeFilter::from_json(&json!({"post_type": [null]})),
            Err(PredicateError::FilterValue { .. })
        ));
    }
}
