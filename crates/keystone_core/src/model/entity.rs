//! Entity aggregate: property state, dirty tracking and the save protocol.
//!
//! # Responsibility
//! - Hold persisted (last committed) and pending (uncommitted) properties.
//! - Route every read/write through the entity's hook registry.
//! - Validate against the kind's compiled rules and persist via a datastore.
//!
//! # Invariants
//! - Reads see pending values first, then persisted ones.
//! - Writes only ever land in `pending`.
//! - An entity is new iff `persisted` has no non-null `id`.
//! - `is_dirty()` iff `pending` is non-empty.
//! - Validation errors describe the most recent `check()` only.
//! - A successful save does not clear `pending`; call `refresh()`.

use crate::hooks::{Access, HookKey, Hooks, Lifecycle};
use crate::model::kind::{EntityType, Kind};
use crate::model::value::{properties_to_json, Properties, Value};
use crate::schema::{FieldSchema, SchemaEntry, SchemaRegistry};
use crate::store::{Datastore, StoreError, ID_FIELD};
use crate::validation::{rule_cache, validate_fields, RuleCompileError, ValidationErrors};
use log::{debug, info};
use serde::{Serialize, Serializer};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

pub type EntityResult<T> = Result<T, EntityError>;

/// Hard failures of entity operations.
///
/// Validation failures are not errors; they are reported through
/// `SaveOutcome::Invalid` and `validation_errors()`.
#[derive(Debug)]
pub enum EntityError {
    MissingProperty { kind: Kind, field: String },
    MissingDatastore { kind: Kind },
    InvalidRules(RuleCompileError),
    Store(StoreError),
}

impl Display for EntityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingProperty { kind, field } => {
                write!(f, "{kind} has no property `{field}`")
            }
            Self::MissingDatastore { kind } => {
                write!(f, "{kind} has no datastore bound or supplied")
            }
            Self::InvalidRules(err) => write!(f, "invalid validation rules: {err}"),
            Self::Store(err) => write!(f, "datastore failure: {err}"),
        }
    }
}

impl Error for EntityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRules(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::MissingProperty { .. } | Self::MissingDatastore { .. } => None,
        }
    }
}

impl From<RuleCompileError> for EntityError {
    fn from(value: RuleCompileError) -> Self {
        Self::InvalidRules(value)
    }
}

impl From<StoreError> for EntityError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Result of one `save` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Nothing pending; no hooks fired and no datastore call made.
    Unchanged,
    /// Validation failed; inspect `validation_errors()`.
    Invalid,
    /// The datastore accepted the write. `id` is the store-assigned id, or
    /// else the id the record was written under.
    Saved { id: Option<Value> },
}

/// ActiveRecord-style wrapper around one stored record of kind `T`.
pub struct Entity<T: EntityType> {
    kind: Kind,
    persisted: Properties,
    pending: Properties,
    errors: ValidationErrors,
    hooks: Hooks<Entity<T>>,
    datastore: Option<Arc<dyn Datastore>>,
    schema: Option<Arc<SchemaRegistry>>,
    marker: PhantomData<fn() -> T>,
}

/// Construction-time wiring for an `Entity`.
pub struct EntityBuilder<T: EntityType> {
    properties: Properties,
    datastore: Option<Arc<dyn Datastore>>,
    schema: Option<Arc<SchemaRegistry>>,
    marker: PhantomData<fn() -> T>,
}

impl<T: EntityType> EntityBuilder<T> {
    /// Initial properties; hydrated as persisted, clean state.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn datastore(mut self, datastore: Arc<dyn Datastore>) -> Self {
        self.datastore = Some(datastore);
        self
    }

    pub fn schema(mut self, schema: Arc<SchemaRegistry>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn build(self) -> Entity<T> {
        Entity {
            kind: Kind::from_type_name(T::TYPE_NAME),
            persisted: self.properties,
            pending: Properties::new(),
            errors: ValidationErrors::new(),
            hooks: Hooks::new(),
            datastore: self.datastore,
            schema: self.schema,
            marker: PhantomData,
        }
    }
}

impl<T: EntityType> Entity<T> {
    pub fn builder() -> EntityBuilder<T> {
        EntityBuilder {
            properties: Properties::new(),
            datastore: None,
            schema: None,
            marker: PhantomData,
        }
    }

    /// Hydrates an unbound entity from committed properties.
    pub fn new(properties: Properties) -> Self {
        Self::builder().properties(properties).build()
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Reads a property through its `get_<name>` hook.
    pub fn get(&self, name: &str) -> EntityResult<Value> {
        let raw = self
            .pending
            .get(name)
            .or_else(|| self.persisted.get(name))
            .cloned()
            .ok_or_else(|| EntityError::MissingProperty {
                kind: self.kind.clone(),
                field: name.to_string(),
            })?;
        Ok(self.hooks.transform(Access::Get, name, raw))
    }

    /// Stages a write through its `set_<name>` hook.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        let value = self.hooks.transform(Access::Set, &name, value.into());
        self.pending.insert(name, value);
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.pending.contains_key(name) || self.persisted.contains_key(name)
    }

    /// Uncommitted writes, as staged.
    pub fn dirty_properties(&self) -> &Properties {
        &self.pending
    }

    /// Last known committed state.
    pub fn persisted_properties(&self) -> &Properties {
        &self.persisted
    }

    /// Persisted overlaid with pending; pending wins on conflicts.
    pub fn properties(&self) -> Properties {
        let mut merged = self.persisted.clone();
        merged.extend(self.pending.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Discards pending writes; persisted state is untouched.
    pub fn refresh(&mut self) -> &mut Self {
        self.pending.clear();
        self
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// New means no committed identifier; pending `id` writes do not count.
    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Committed identifier, if any.
    pub fn id(&self) -> Option<&Value> {
        self.persisted.get(ID_FIELD).filter(|id| !id.is_null())
    }

    pub fn datastore(&self) -> Option<&Arc<dyn Datastore>> {
        self.datastore.as_ref()
    }

    /// Schema metadata for this entity's kind, when a registry is bound.
    pub fn schema(&self) -> Option<&SchemaEntry> {
        self.schema
            .as_deref()
            .and_then(|registry| registry.entry(self.kind.as_str()))
    }

    pub fn field_schema(&self, name: &str) -> Option<&FieldSchema> {
        self.schema().and_then(|entry| entry.field(name))
    }

    pub fn hooks(&self) -> &Hooks<Self> {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks<Self> {
        &mut self.hooks
    }

    /// Attaches a read transform for one field.
    pub fn on_get<F>(&mut self, field: impl Into<String>, handler: F) -> HookKey
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.hooks.on_get(field, handler)
    }

    /// Attaches a write transform for one field.
    pub fn on_set<F>(&mut self, field: impl Into<String>, handler: F) -> HookKey
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.hooks.on_set(field, handler)
    }

    /// Attaches a lifecycle notification.
    pub fn on<F>(&mut self, point: Lifecycle, handler: F) -> HookKey
    where
        F: Fn(&Self) + 'static,
    {
        self.hooks.on(point, handler)
    }

    /// Runs one validation pass over every field declared for this kind.
    ///
    /// Rules are compiled at most once per kind per process. Only a bad rule
    /// declaration is an error; failing values yield `Ok(false)`.
    pub fn check(&mut self) -> EntityResult<bool> {
        self.errors.clear();
        let rules = rule_cache().get_or_compile(&self.kind, T::validation_rules)?;
        let report = validate_fields(&rules, |field| self.get(field).ok());

        debug!(
            "event=entity_validate module=model status={} kind={} failed_fields={}",
            if report.valid { "ok" } else { "invalid" },
            self.kind,
            report.errors.len()
        );
        self.errors = report.errors;
        Ok(report.valid)
    }

    /// Alias of `check`; recomputed on every call.
    pub fn is_valid(&mut self) -> EntityResult<bool> {
        self.check()
    }

    /// Errors from the most recent validation pass; empty before any pass.
    pub fn validation_errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Saves through the bound datastore.
    pub fn save(&mut self) -> EntityResult<SaveOutcome> {
        self.save_with(None)
    }

    /// Saves through `datastore` instead of the bound one.
    pub fn save_to(&mut self, datastore: &dyn Datastore) -> EntityResult<SaveOutcome> {
        self.save_with(Some(datastore))
    }

    fn save_with(&mut self, explicit: Option<&dyn Datastore>) -> EntityResult<SaveOutcome> {
        if !self.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }

        self.hooks.notify(Lifecycle::BeforeValidate, self);
        if !self.check()? {
            info!(
                "event=entity_save module=model status=invalid kind={} failed_fields={}",
                self.kind,
                self.errors.len()
            );
            return Ok(SaveOutcome::Invalid);
        }
        self.hooks.notify(Lifecycle::AfterValidate, self);

        let bound = self.datastore.clone();
        let Some(datastore) = explicit.or(bound.as_deref()) else {
            return Err(EntityError::MissingDatastore {
                kind: self.kind.clone(),
            });
        };

        self.hooks.notify(Lifecycle::BeforeSave, self);
        let written = self.properties();
        let assigned = datastore.put(&self.kind, &written)?;
        if let Some(id) = &assigned {
            if self.is_new() {
                self.persisted.insert(ID_FIELD.to_string(), id.clone());
            }
        }
        self.hooks.notify(Lifecycle::AfterSave, self);

        // A caller-chosen id staged in pending is what the store wrote under.
        let id = assigned.or_else(|| written.get(ID_FIELD).filter(|id| !id.is_null()).cloned());
        info!(
            "event=entity_save module=model status=ok kind={} id={}",
            self.kind,
            id.as_ref().map_or_else(|| "none".to_string(), Value::to_string)
        );
        Ok(SaveOutcome::Saved { id })
    }

    /// Merged properties as JSON; timestamps render as ISO-8601 strings.
    pub fn to_json(&self) -> serde_json::Value {
        properties_to_json(&self.properties())
    }
}

impl<T: EntityType> Serialize for Entity<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.properties().serialize(serializer)
    }
}

impl<T: EntityType> Debug for Entity<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("kind", &self.kind)
            .field("persisted", &self.persisted)
            .field("pending", &self.pending)
            .field("errors", &self.errors)
            .field("hooks", &self.hooks)
            .field("datastore", &self.datastore.is_some())
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Entity, EntityError};
    use crate::model::kind::EntityType;
    use crate::model::value::{Properties, Value};

    struct Note;

    impl EntityType for Note {
        const TYPE_NAME: &'static str = "StickyNote";
    }

    fn hydrated() -> Entity<Note> {
        let mut props = Properties::new();
        props.insert("id".into(), Value::Int(1));
        props.insert("title".into(), Value::from("x"));
        Entity::new(props)
    }

    #[test]
    fn kind_is_tableized_type_name() {
        assert_eq!(hydrated().kind().as_str(), "sticky_notes");
    }

    #[test]
    fn reads_prefer_pending_over_persisted() {
        let mut note = hydrated();
        assert_eq!(note.get("title").unwrap(), Value::from("x"));
        note.set("title", "y");
        assert_eq!(note.get("title").unwrap(), Value::from("y"));
        assert_eq!(note.persisted_properties()["title"], Value::from("x"));
    }

    #[test]
    fn missing_property_names_kind_and_field() {
        let err = hydrated().get("body").unwrap_err();
        match err {
            EntityError::MissingProperty { kind, field } => {
                assert_eq!(kind.as_str(), "sticky_notes");
                assert_eq!(field, "body");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pending_id_does_not_make_entity_persisted() {
        let mut note: Entity<Note> = Entity::new(Properties::new());
        note.set("id", 9);
        assert!(note.is_new());
        assert!(note.has("id"));
    }

    #[test]
    fn null_id_counts_as_new() {
        let mut props = Properties::new();
        props.insert("id".into(), Value::Null);
        let note: Entity<Note> = Entity::new(props);
        assert!(note.is_new());
    }
}
