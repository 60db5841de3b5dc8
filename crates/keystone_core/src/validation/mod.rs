//! Declarative validation: rule specs, compiler, cache and engine.
//!
//! # Responsibility
//! - Parse per-kind rule declarations (string or structured form).
//! - Compile them into typed rules, memoized per kind.
//! - Evaluate compiled rules into data (booleans + message maps).
//!
//! # Invariants
//! - Validation outcomes are never errors; only bad declarations are.
//! - Every declared field is evaluated on every pass.

mod compiler;
mod engine;
mod error;
mod rule;
mod spec;

pub use compiler::{rule_cache, FieldRuleSet, RuleCache, RuleSet};
pub use engine::{validate_fields, ValidationErrors, ValidationReport};
pub use error::RuleCompileError;
pub use rule::Rule;
pub use spec::{FieldRules, RuleDocument, RuleEntry, RuleSpec, REQUIRED_RULE};
