//! Declarative validation-rule specifications.
//!
//! Two shapes are accepted per field:
//! - string chains: `"required|min:1,true"`
//! - structured lists mixing bare names and `{name: [args]}` entries
//!
//! Both normalize to an ordered `Vec<RuleEntry>` before compilation.

use crate::model::value::Value;
use crate::validation::error::RuleCompileError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static RULE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_]*)\s*(?::(.*))?$").expect("static rule token regex")
});

/// Reserved pseudo-rule marking a presence requirement.
pub const REQUIRED_RULE: &str = "required";

/// One named rule with its (typed) argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub name: String,
    pub args: Vec<Value>,
}

impl RuleEntry {
    /// Rule without arguments, e.g. `notEmpty`.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Rule with an explicit argument list, e.g. `min` with `[1, true]`.
    pub fn with_args<I, V>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_required_marker(&self) -> bool {
        self.name.trim().eq_ignore_ascii_case(REQUIRED_RULE)
    }
}

/// Rules declared for a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRules {
    /// Pipe-separated string form.
    ///
    /// Every `|` splits the chain, including one inside a `regex:` pattern,
    /// so `regex:^(a|b)$` is rejected as malformed. Patterns that use
    /// alternation must be declared through [`FieldRules::Entries`].
    Chain(String),
    /// Structured, already-split form.
    Entries(Vec<RuleEntry>),
}

impl FieldRules {
    /// Normalizes either shape into an ordered entry list.
    pub fn entries(&self, field: &str) -> Result<Vec<RuleEntry>, RuleCompileError> {
        match self {
            Self::Chain(chain) => parse_chain(field, chain),
            Self::Entries(entries) => {
                for entry in entries {
                    if entry.name.trim().is_empty() {
                        return Err(RuleCompileError::EmptyRuleName {
                            field: field.to_string(),
                        });
                    }
                }
                Ok(entries.clone())
            }
        }
    }
}

impl From<&str> for FieldRules {
    fn from(value: &str) -> Self {
        Self::Chain(value.to_string())
    }
}

impl From<String> for FieldRules {
    fn from(value: String) -> Self {
        Self::Chain(value)
    }
}

impl From<Vec<RuleEntry>> for FieldRules {
    fn from(value: Vec<RuleEntry>) -> Self {
        Self::Entries(value)
    }
}

/// Ordered field -> rules declaration for one entity kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSpec {
    fields: Vec<(String, FieldRules)>,
}

impl RuleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares (or replaces) the rules for one field.
    pub fn field(mut self, name: impl Into<String>, rules: impl Into<FieldRules>) -> Self {
        let name = name.into();
        let rules = rules.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = rules,
            None => self.fields.push((name, rules)),
        }
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldRules)> {
        self.fields.iter().map(|(name, rules)| (name.as_str(), rules))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a JSON object of `field -> "chain"` or `field -> [entries]`.
    ///
    /// Array items are either bare rule-name strings or single-key objects
    /// mapping a rule name to its argument list (a scalar is one argument).
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, RuleCompileError> {
        let object = value.as_object().ok_or_else(|| {
            RuleCompileError::MalformedSpec("rule spec must be an object keyed by field".into())
        })?;

        let mut spec = Self::new();
        for (field, rules) in object {
            let rules = match rules {
                serde_json::Value::String(chain) => FieldRules::Chain(chain.clone()),
                serde_json::Value::Array(items) => {
                    FieldRules::Entries(parse_structured_items(field, items)?)
                }
                other => {
                    return Err(RuleCompileError::MalformedSpec(format!(
                        "rules for field `{field}` must be a string or list, got {other}"
                    )));
                }
            };
            spec = spec.field(field.clone(), rules);
        }
        Ok(spec)
    }
}

/// Rule specifications for many kinds, loaded from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleDocument {
    kinds: BTreeMap<String, RuleSpec>,
}

impl RuleDocument {
    pub fn from_json_str(raw: &str) -> Result<Self, RuleCompileError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| RuleCompileError::MalformedSpec(format!("invalid JSON: {err}")))?;
        Self::from_json_value(&value)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, RuleCompileError> {
        let value: serde_json::Value = toml::from_str(raw)
            .map_err(|err| RuleCompileError::MalformedSpec(format!("invalid TOML: {err}")))?;
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, RuleCompileError> {
        let object = value.as_object().ok_or_else(|| {
            RuleCompileError::MalformedSpec("rule document must be an object keyed by kind".into())
        })?;
        let mut kinds = BTreeMap::new();
        for (kind, spec) in object {
            kinds.insert(kind.clone(), RuleSpec::from_json_value(spec)?);
        }
        Ok(Self { kinds })
    }

    pub fn get(&self, kind: &str) -> Option<&RuleSpec> {
        self.kinds.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}

fn parse_chain(field: &str, chain: &str) -> Result<Vec<RuleEntry>, RuleCompileError> {
    let mut entries = Vec::new();
    for token in chain.split('|') {
        if token.trim().is_empty() {
            // Tolerate `a||b` and trailing pipes; an all-empty chain yields no rules.
            continue;
        }
        let captures =
            RULE_TOKEN
                .captures(token)
                .ok_or_else(|| RuleCompileError::MalformedToken {
                    field: field.to_string(),
                    token: token.trim().to_string(),
                })?;
        let name = captures[1].to_string();
        let args = match captures.get(2) {
            None => Vec::new(),
            // Patterns may legitimately contain commas.
            Some(raw) if name.eq_ignore_ascii_case("regex") => {
                vec![Value::Text(raw.as_str().to_string())]
            }
            Some(raw) => raw.as_str().split(',').map(parse_literal).collect(),
        };
        entries.push(RuleEntry { name, args });
    }
    Ok(entries)
}

fn parse_structured_items(
    field: &str,
    items: &[serde_json::Value],
) -> Result<Vec<RuleEntry>, RuleCompileError> {
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        match item {
            serde_json::Value::String(name) => entries.push(RuleEntry::bare(name.trim())),
            serde_json::Value::Object(map) if map.len() == 1 => {
                for (name, args) in map {
                    let args = match args {
                        serde_json::Value::Array(values) => {
                            values.iter().cloned().map(Value::from).collect()
                        }
                        scalar => vec![Value::from(scalar.clone())],
                    };
                    entries.push(RuleEntry {
                        name: name.trim().to_string(),
                        args,
                    });
                }
            }
            other => {
                return Err(RuleCompileError::MalformedSpec(format!(
                    "rule entry for field `{field}` must be a name or single-key object, got {other}"
                )));
            }
        }
    }
    Ok(entries)
}

/// Types one string-form argument: int, float, bool, null, otherwise text.
pub(crate) fn parse_literal(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if float.is_finite() {
            return Value::Float(float);
        }
    }
    Value::Text(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{parse_literal, FieldRules, RuleDocument, RuleEntry, RuleSpec};
    use crate::model::value::Value;
    use crate::validation::error::RuleCompileError;
    use serde_json::json;

    #[test]
    fn parses_string_chain_with_typed_arguments() {
        let entries = FieldRules::from("required|min:1,true")
            .entries("age")
            .unwrap();
        assert_eq!(
            entries,
            vec![
                RuleEntry::bare("required"),
                RuleEntry::with_args("min", [Value::Int(1), Value::Bool(true)]),
            ]
        );
    }

    #[test]
    fn regex_argument_keeps_commas() {
        let entries = FieldRules::from("regex:^[0-9]{1,3}$").entries("code").unwrap();
        assert_eq!(
            entries[0].args,
            vec![Value::Text("^[0-9]{1,3}$".to_string())]
        );
    }

    #[test]
    fn rejects_malformed_token() {
        let err = FieldRules::from("notEmpty|9lives").entries("name").unwrap_err();
        assert_eq!(
            err,
            RuleCompileError::MalformedToken {
                field: "name".to_string(),
                token: "9lives".to_string(),
            }
        );
    }

    #[test]
    fn empty_segments_are_ignored() {
        let entries = FieldRules::from("notEmpty||").entries("name").unwrap();
        assert_eq!(entries, vec![RuleEntry::bare("notEmpty")]);
    }

    #[test]
    fn parses_structured_json_form() {
        let spec = RuleSpec::from_json_value(&json!({
            "age": ["required", {"min": [1, true]}, {"max": 120}],
            "name": "notEmpty"
        }))
        .unwrap();

        let fields: Vec<_> = spec.fields().collect();
        assert_eq!(fields.len(), 2);
        let age = spec
            .fields()
            .find(|(name, _)| *name == "age")
            .map(|(_, rules)| rules.entries("age").unwrap())
            .unwrap();
        assert_eq!(
            age,
            vec![
                RuleEntry::bare("required"),
                RuleEntry::with_args("min", [Value::Int(1), Value::Bool(true)]),
                RuleEntry::with_args("max", [Value::Int(120)]),
            ]
        );
    }

    #[test]
    fn redeclaring_a_field_replaces_its_rules() {
        let spec = RuleSpec::new()
            .field("name", "notEmpty")
            .field("name", "alpha");
        assert_eq!(spec.len(), 1);
        assert_eq!(
            spec.fields().next().map(|(_, rules)| rules.clone()),
            Some(FieldRules::Chain("alpha".to_string()))
        );
    }

    #[test]
    fn loads_rule_documents_from_toml() {
        let doc = RuleDocument::from_toml_str(
            r#"
            [posts]
            title = "required|notEmpty"
            rating = ["intVal", { between = [1, 5] }]
            "#,
        )
        .unwrap();
        assert_eq!(doc.kinds().collect::<Vec<_>>(), vec!["posts"]);
        assert_eq!(doc.get("posts").map(RuleSpec::len), Some(2));
    }

    #[test]
    fn literal_typing() {
        assert_eq!(parse_literal(" 5 "), Value::Int(5));
        assert_eq!(parse_literal("2.5"), Value::Float(2.5));
        assert_eq!(parse_literal("false"), Value::Bool(false));
        assert_eq!(parse_literal("null"), Value::Null);
        assert_eq!(parse_literal("abc"), Value::Text("abc".to_string()));
        assert_eq!(parse_literal("inf"), Value::Text("inf".to_string()));
    }
}
