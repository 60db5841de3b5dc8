//! Core of Keystone: an ActiveRecord-style entity layer.
//! Entities carry dirty-tracked properties, validate against declarative
//! per-kind rules, expose hook points and persist through a datastore.

pub mod config;
pub mod db;
pub mod hooks;
pub mod logging;
pub mod model;
pub mod schema;
pub mod store;
pub mod validation;

pub use config::{load_rules, Bootstrapped, ConfigError, ConfigResult, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use hooks::{Access, HookKey, HookPoint, Hooks, Lifecycle};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::entity::{Entity, EntityBuilder, EntityError, EntityResult, SaveOutcome};
pub use model::kind::{EntityType, Kind};
pub use model::relation::RelationOptions;
pub use model::value::{Conditions, Properties, Value};
pub use schema::{FieldSchema, SchemaEntry, SchemaError, SchemaRegistry, SchemaResult};
pub use store::{
    Datastore, MemoryDatastore, Record, SqliteDatastore, StoreCall, StoreError, StoreResult,
    ID_FIELD,
};
pub use validation::{
    rule_cache, validate_fields, FieldRules, RuleCache, RuleCompileError, RuleDocument, RuleEntry,
    RuleSet, RuleSpec, ValidationErrors, ValidationReport,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
