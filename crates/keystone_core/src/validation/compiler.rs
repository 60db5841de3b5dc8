//! Rule compilation and the process-wide compiled-rule cache.
//!
//! # Responsibility
//! - Turn a `RuleSpec` into a `RuleSet` of typed rules per field.
//! - Memoize compiled rule sets per entity kind for the process lifetime.
//!
//! # Invariants
//! - `required` is never compiled into a value rule; it only sets the
//!   field's presence flag.
//! - A kind is compiled at most once unless `recompile`/`invalidate` is
//!   called explicitly. Failed compilations are not cached.
//! - Compilation for a kind happens under the cache lock, so concurrent
//!   first use compiles once.

use crate::model::kind::Kind;
use crate::validation::error::RuleCompileError;
use crate::validation::rule::Rule;
use crate::validation::spec::RuleSpec;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static GLOBAL_RULE_CACHE: Lazy<RuleCache> = Lazy::new(RuleCache::new);

/// Compiled rules for one field.
#[derive(Debug, Clone, Default)]
pub struct FieldRuleSet {
    pub required: bool,
    pub rules: Vec<Rule>,
}

impl FieldRuleSet {
    /// Canonical names of the value rules, in chain order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(Rule::name).collect()
    }
}

/// Compiled rules for one entity kind, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<(String, FieldRuleSet)>,
}

impl RuleSet {
    /// Compiles a declarative spec; fails on the first bad declaration.
    pub fn compile(spec: &RuleSpec) -> Result<Self, RuleCompileError> {
        let mut fields = Vec::with_capacity(spec.len());
        for (field, declared) in spec.fields() {
            let mut compiled = FieldRuleSet::default();
            for entry in declared.entries(field)? {
                if entry.is_required_marker() {
                    if !entry.args.is_empty() {
                        return Err(RuleCompileError::InvalidArguments {
                            field: field.to_string(),
                            rule: entry.name.clone(),
                            reason: "`required` takes no arguments".to_string(),
                        });
                    }
                    compiled.required = true;
                    continue;
                }
                compiled.rules.push(Rule::build(field, &entry)?);
            }
            fields.push((field.to_string(), compiled));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldRuleSet)> {
        self.fields.iter().map(|(name, rules)| (name.as_str(), rules))
    }

    pub fn field(&self, name: &str) -> Option<&FieldRuleSet> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, rules)| rules)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Default)]
struct CacheState {
    compiled: HashMap<Kind, Arc<RuleSet>>,
    compile_counts: HashMap<Kind, usize>,
}

/// Kind -> compiled `RuleSet` memo.
///
/// One process-wide instance backs entity validation (`rule_cache()`);
/// standalone instances are useful for tooling and tests.
#[derive(Default)]
pub struct RuleCache {
    state: Mutex<CacheState>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached rule set, compiling `spec()` on first use.
    ///
    /// `spec` is only invoked on a cache miss.
    pub fn get_or_compile<F>(&self, kind: &Kind, spec: F) -> Result<Arc<RuleSet>, RuleCompileError>
    where
        F: FnOnce() -> RuleSpec,
    {
        let mut state = self.lock();
        if let Some(rules) = state.compiled.get(kind) {
            return Ok(Arc::clone(rules));
        }
        compile_into(&mut state, kind, &spec(), "rules_compile")
    }

    /// Replaces the cached rule set for `kind` with a fresh compilation.
    ///
    /// On failure the previous entry is dropped rather than kept stale.
    pub fn recompile(&self, kind: &Kind, spec: &RuleSpec) -> Result<Arc<RuleSet>, RuleCompileError> {
        let mut state = self.lock();
        state.compiled.remove(kind);
        compile_into(&mut state, kind, spec, "rules_recompile")
    }

    /// Drops the cached rule set for `kind`; the next use recompiles.
    pub fn invalidate(&self, kind: &Kind) -> bool {
        let removed = self.lock().compiled.remove(kind).is_some();
        if removed {
            debug!("event=rules_invalidate module=validation status=ok kind={kind}");
        }
        removed
    }

    pub fn contains(&self, kind: &Kind) -> bool {
        self.lock().compiled.contains_key(kind)
    }

    /// Number of compilation attempts made for `kind` by this cache.
    pub fn compile_count(&self, kind: &Kind) -> usize {
        self.lock().compile_counts.get(kind).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // A panic inside a compile leaves the maps consistent; keep serving.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide cache used by `Entity::check`.
pub fn rule_cache() -> &'static RuleCache {
    &GLOBAL_RULE_CACHE
}

fn compile_into(
    state: &mut CacheState,
    kind: &Kind,
    spec: &RuleSpec,
    event: &str,
) -> Result<Arc<RuleSet>, RuleCompileError> {
    *state.compile_counts.entry(kind.clone()).or_default() += 1;

    match RuleSet::compile(spec) {
        Ok(rules) => {
            info!(
                "event={event} module=validation status=ok kind={kind} fields={}",
                rules.len()
            );
            let rules = Arc::new(rules);
            state.compiled.insert(kind.clone(), Arc::clone(&rules));
            Ok(rules)
        }
        Err(err) => {
            warn!("event={event} module=validation status=error kind={kind} error={err}");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RuleCache, RuleSet};
    use crate::model::kind::Kind;
    use crate::model::value::Value;
    use crate::validation::engine::validate_fields;
    use crate::validation::error::RuleCompileError;
    use crate::validation::spec::{RuleEntry, RuleSpec};
    use std::cell::Cell;
    use std::sync::Arc;

    #[test]
    fn required_is_extracted_from_the_chain() {
        let rules = RuleSet::compile(
            &RuleSpec::new()
                .field("name", "required|notEmpty")
                .field("nick", "alpha"),
        )
        .unwrap();

        let name = rules.field("name").unwrap();
        assert!(name.required);
        assert_eq!(name.rule_names(), vec!["notEmpty"]);
        let nick = rules.field("nick").unwrap();
        assert!(!nick.required);
    }

    #[test]
    fn structured_required_entry_is_extracted_too() {
        let rules = RuleSet::compile(&RuleSpec::new().field(
            "age",
            vec![RuleEntry::bare("Required"), RuleEntry::with_args("min", [1])],
        ))
        .unwrap();
        let age = rules.field("age").unwrap();
        assert!(age.required);
        assert_eq!(age.rule_names(), vec!["min"]);
    }

    #[test]
    fn required_with_arguments_is_rejected() {
        let err = RuleSet::compile(&RuleSpec::new().field("name", "required:1")).unwrap_err();
        assert!(matches!(err, RuleCompileError::InvalidArguments { .. }));
    }

    #[test]
    fn regex_alternation_needs_the_structured_form() {
        let err = RuleSet::compile(&RuleSpec::new().field("code", "regex:^(a|b)$")).unwrap_err();
        assert!(matches!(err, RuleCompileError::MalformedToken { ref token, .. } if token == "b)$"));

        let rules = RuleSet::compile(&RuleSpec::new().field(
            "code",
            vec![RuleEntry::with_args("regex", ["^(a|b)$"])],
        ))
        .unwrap();
        assert!(validate_fields(&rules, |_| Some(Value::from("b"))).valid);
        assert!(!validate_fields(&rules, |_| Some(Value::from("c"))).valid);
    }

    #[test]
    fn cache_compiles_once_per_kind() {
        let cache = RuleCache::new();
        let kind = Kind::new("widgets");
        let calls = Cell::new(0);
        let spec = || {
            calls.set(calls.get() + 1);
            RuleSpec::new().field("name", "notEmpty")
        };

        let first = cache.get_or_compile(&kind, spec).unwrap();
        let second = cache.get_or_compile(&kind, spec).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.compile_count(&kind), 1);
    }

    #[test]
    fn recompile_and_invalidate_replace_entries() {
        let cache = RuleCache::new();
        let kind = Kind::new("gadgets");
        cache
            .get_or_compile(&kind, || RuleSpec::new().field("a", "notEmpty"))
            .unwrap();

        let replaced = cache
            .recompile(&kind, &RuleSpec::new().field("a", "notEmpty").field("b", "alpha"))
            .unwrap();
        assert_eq!(replaced.len(), 2);
        assert_eq!(cache.compile_count(&kind), 2);

        assert!(cache.invalidate(&kind));
        assert!(!cache.contains(&kind));
        assert!(!cache.invalidate(&kind));
    }

    #[test]
    fn failed_compilation_is_not_cached() {
        let cache = RuleCache::new();
        let kind = Kind::new("broken");
        assert!(cache
            .get_or_compile(&kind, || RuleSpec::new().field("a", "nope"))
            .is_err());
        assert!(!cache.contains(&kind));
        assert_eq!(cache.compile_count(&kind), 1);
    }
}
