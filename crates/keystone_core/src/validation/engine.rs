//! Validator engine: runs a compiled `RuleSet` against a value source.

use crate::model::value::Value;
use crate::validation::compiler::RuleSet;
use std::collections::BTreeMap;

/// Field -> ordered failure messages from one validation pass.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

/// Outcome of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: ValidationErrors,
}

/// Validates every field declared in `rules`, never short-circuiting.
///
/// `lookup` returns the current value of a field, or `None` when the field
/// is absent. Absent required fields record a presence failure and skip value
/// rules; absent optional fields are skipped. Present fields run their whole
/// rule chain and record one message per failing rule.
pub fn validate_fields<F>(rules: &RuleSet, mut lookup: F) -> ValidationReport
where
    F: FnMut(&str) -> Option<Value>,
{
    let mut report = ValidationReport {
        valid: true,
        errors: ValidationErrors::new(),
    };

    for (field, field_rules) in rules.fields() {
        let Some(value) = lookup(field) else {
            if field_rules.required {
                report.valid = false;
                report
                    .errors
                    .entry(field.to_string())
                    .or_default()
                    .push(format!("{field} is required"));
            }
            continue;
        };

        let messages: Vec<String> = field_rules
            .rules
            .iter()
            .filter_map(|rule| rule.check(field, &value).err())
            .collect();
        if !messages.is_empty() {
            report.valid = false;
            report
                .errors
                .entry(field.to_string())
                .or_default()
                .extend(messages);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::validate_fields;
    use crate::model::value::{Properties, Value};
    use crate::validation::compiler::RuleSet;
    use crate::validation::spec::RuleSpec;

    fn rules() -> RuleSet {
        RuleSet::compile(
            &RuleSpec::new()
                .field("name", "required|notEmpty")
                .field("age", "positive|min:1,true")
                .field("nick", "alpha"),
        )
        .unwrap()
    }

    #[test]
    fn missing_required_field_fails_without_running_value_rules() {
        let report = validate_fields(&rules(), |_| None);
        assert!(!report.valid);
        assert_eq!(report.errors["name"], vec!["name is required".to_string()]);
        assert!(!report.errors.contains_key("age"));
        assert!(!report.errors.contains_key("nick"));
    }

    #[test]
    fn collects_one_message_per_failing_rule_across_all_fields() {
        let mut props = Properties::new();
        props.insert("name".into(), Value::from(""));
        props.insert("age".into(), Value::Int(-5));
        let report = validate_fields(&rules(), |field| props.get(field).cloned());

        assert!(!report.valid);
        assert_eq!(report.errors["name"], vec!["name must not be empty".to_string()]);
        assert_eq!(
            report.errors["age"],
            vec![
                "age must be positive".to_string(),
                "age must be greater than or equal to 1".to_string(),
            ]
        );
    }

    #[test]
    fn passes_when_every_present_field_is_valid() {
        let mut props = Properties::new();
        props.insert("name".into(), Value::from("Ada"));
        props.insert("age".into(), Value::Int(10));
        let report = validate_fields(&rules(), |field| props.get(field).cloned());
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }
}
