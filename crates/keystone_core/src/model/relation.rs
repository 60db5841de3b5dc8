//! Relationship resolution between entities by naming convention.
//!
//! # Responsibility
//! - Resolve `belongs_to` (this entity holds the foreign key).
//! - Resolve `has_many` (target records hold a key pointing here).
//!
//! # Invariants
//! - No datastore call is made when the lookup key is absent or null.
//! - Lookups never mutate the calling entity.

use crate::model::entity::{Entity, EntityError, EntityResult};
use crate::model::inflect::{foreign_key, underscore};
use crate::model::kind::{EntityType, Kind};
use crate::model::value::{Conditions, Value};
use crate::store::{Datastore, Record};
use log::debug;

/// Overrides applied to one relationship lookup.
#[derive(Default)]
pub struct RelationOptions<'a> {
    foreign_key: Option<String>,
    datastore: Option<&'a dyn Datastore>,
    conditions: Conditions,
}

impl<'a> RelationOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the conventional foreign-key name.
    pub fn foreign_key(mut self, key: impl Into<String>) -> Self {
        self.foreign_key = Some(key.into());
        self
    }

    /// Queries `datastore` instead of the entity's bound one.
    pub fn datastore(mut self, datastore: &'a dyn Datastore) -> Self {
        self.datastore = Some(datastore);
        self
    }

    /// Adds an equality filter (`has_many` only).
    pub fn condition(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }
}

impl<T: EntityType> Entity<T> {
    /// Resolves the single `target` record this entity points at.
    ///
    /// `belongs_to("author")` reads `author_id` and looks it up in `authors`.
    pub fn belongs_to(
        &self,
        target: &str,
        options: RelationOptions<'_>,
    ) -> EntityResult<Option<Record>> {
        let target_kind = Kind::from_type_name(target);
        let key = options
            .foreign_key
            .unwrap_or_else(|| foreign_key(target));

        let id = if self.has(&key) { self.get(&key)? } else { Value::Null };
        if id.is_null() {
            debug!(
                "event=relation_lookup module=model status=skipped relation=belongs_to kind={} target={target_kind} key={key}",
                self.kind()
            );
            return Ok(None);
        }

        let datastore = self.lookup_datastore(options.datastore)?;
        let found = datastore.find(&target_kind, &id)?;
        debug!(
            "event=relation_lookup module=model status=ok relation=belongs_to kind={} target={target_kind} key={key} found={}",
            self.kind(),
            found.is_some()
        );
        Ok(found)
    }

    /// Resolves every `target` record pointing at this entity.
    ///
    /// `has_many("comment")` on a post filters `comments` by `post_id`. The
    /// default key is built from `T::TYPE_NAME`, not from the plural kind.
    /// Caller conditions are merged in; the key condition wins on conflict.
    pub fn has_many(&self, target: &str, options: RelationOptions<'_>) -> EntityResult<Vec<Record>> {
        let target_kind = Kind::from_type_name(target);
        let key = options
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", underscore(T::TYPE_NAME)));

        let Some(id) = self.id().cloned() else {
            debug!(
                "event=relation_lookup module=model status=skipped relation=has_many kind={} target={target_kind} key={key}",
                self.kind()
            );
            return Ok(Vec::new());
        };

        let datastore = self.lookup_datastore(options.datastore)?;
        let mut conditions = options.conditions;
        conditions.insert(key.clone(), id);
        let found = datastore.find_custom(&target_kind, &conditions)?;
        debug!(
            "event=relation_lookup module=model status=ok relation=has_many kind={} target={target_kind} key={key} found={}",
            self.kind(),
            found.len()
        );
        Ok(found)
    }

    fn lookup_datastore<'s>(
        &'s self,
        explicit: Option<&'s dyn Datastore>,
    ) -> EntityResult<&'s dyn Datastore> {
        explicit
            .or_else(|| self.datastore().map(|bound| &**bound as &dyn Datastore))
            .ok_or_else(|| EntityError::MissingDatastore {
                kind: self.kind().clone(),
            })
    }
}
