//! In-process datastore adapter.
//!
//! Records live in a kind-partitioned map guarded by a mutex. New records get
//! monotonically increasing integer identifiers. Every call is recorded so
//! callers can assert on storage traffic.

use crate::model::kind::Kind;
use crate::model::value::{Conditions, Properties, Value};
use crate::store::{Datastore, Record, StoreResult, ID_FIELD};
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One observed datastore call.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Put { kind: Kind, properties: Properties },
    Find { kind: Kind, id: Value },
    FindCustom { kind: Kind, conditions: Conditions },
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<Kind, Vec<Properties>>,
    next_id: i64,
    calls: Vec<StoreCall>,
}

/// Datastore keeping every record in memory.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    state: Mutex<MemoryState>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record directly, bypassing call recording.
    ///
    /// Integer ids above the internal counter advance it so later inserts do
    /// not collide.
    pub fn seed(&self, kind: &Kind, properties: Properties) {
        let mut state = self.lock();
        if let Some(id) = properties.get(ID_FIELD).and_then(Value::as_i64) {
            state.next_id = state.next_id.max(id);
        }
        state.records.entry(kind.clone()).or_default().push(properties);
    }

    /// Every call observed so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of records stored for `kind`.
    pub fn len(&self, kind: &Kind) -> usize {
        self.lock().records.get(kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.values().all(Vec::is_empty)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Datastore for MemoryDatastore {
    fn put(&self, kind: &Kind, properties: &Properties) -> StoreResult<Option<Value>> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Put {
            kind: kind.clone(),
            properties: properties.clone(),
        });

        let existing_id = properties.get(ID_FIELD).filter(|id| !id.is_null()).cloned();
        let (stored, assigned) = match existing_id {
            Some(id) => {
                if let Some(n) = id.as_i64() {
                    state.next_id = state.next_id.max(n);
                }
                (properties.clone(), None)
            }
            None => {
                state.next_id += 1;
                let id = Value::Int(state.next_id);
                let mut stored = properties.clone();
                stored.insert(ID_FIELD.to_string(), id.clone());
                (stored, Some(id))
            }
        };

        let rows = state.records.entry(kind.clone()).or_default();
        let id = stored.get(ID_FIELD).cloned();
        match rows.iter_mut().find(|row| row.get(ID_FIELD) == id.as_ref()) {
            Some(row) => *row = stored,
            None => rows.push(stored),
        }

        debug!(
            "event=store_put module=store status=ok backend=memory kind={kind} assigned={}",
            assigned.is_some()
        );
        Ok(assigned)
    }

    fn find(&self, kind: &Kind, id: &Value) -> StoreResult<Option<Record>> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Find {
            kind: kind.clone(),
            id: id.clone(),
        });

        let found = state
            .records
            .get(kind)
            .and_then(|rows| rows.iter().find(|row| row.get(ID_FIELD) == Some(id)))
            .map(|row| Record::new(kind.clone(), row.clone()));
        Ok(found)
    }

    fn find_custom(&self, kind: &Kind, conditions: &Conditions) -> StoreResult<Vec<Record>> {
        let mut state = self.lock();
        state.calls.push(StoreCall::FindCustom {
            kind: kind.clone(),
            conditions: conditions.clone(),
        });

        let matches = state
            .records
            .get(kind)
            .map(|rows| {
                rows.iter()
                    .map(|row| Record::new(kind.clone(), row.clone()))
                    .filter(|record| record.matches(conditions))
                    .collect()
            })
            .unwrap_or_default();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryDatastore, StoreCall};
    use crate::model::kind::Kind;
    use crate::model::value::{Conditions, Properties, Value};
    use crate::store::Datastore;

    fn props(pairs: &[(&str, Value)]) -> Properties {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn put_assigns_ids_to_new_records_only() {
        let store = MemoryDatastore::new();
        let kind = Kind::new("posts");

        let first = store.put(&kind, &props(&[("title", "a".into())])).unwrap();
        let second = store.put(&kind, &props(&[("title", "b".into())])).unwrap();
        assert_eq!(first, Some(Value::Int(1)));
        assert_eq!(second, Some(Value::Int(2)));

        let updated = store
            .put(&kind, &props(&[("id", Value::Int(1)), ("title", "a2".into())]))
            .unwrap();
        assert_eq!(updated, None);
        assert_eq!(store.len(&kind), 2);

        let found = store.find(&kind, &Value::Int(1)).unwrap().unwrap();
        assert_eq!(found.get("title"), Some(&Value::from("a2")));
    }

    #[test]
    fn seeded_ids_advance_the_counter() {
        let store = MemoryDatastore::new();
        let kind = Kind::new("posts");
        store.seed(&kind, props(&[("id", Value::Int(10))]));

        let assigned = store.put(&kind, &Properties::new()).unwrap();
        assert_eq!(assigned, Some(Value::Int(11)));
    }

    #[test]
    fn find_custom_filters_by_equality_and_records_calls() {
        let store = MemoryDatastore::new();
        let kind = Kind::new("comments");
        store.seed(&kind, props(&[("id", Value::Int(1)), ("post_id", Value::Int(42))]));
        store.seed(&kind, props(&[("id", Value::Int(2)), ("post_id", Value::Int(7))]));

        let mut conditions = Conditions::new();
        conditions.insert("post_id".into(), Value::Int(42));
        let found = store.find_custom(&kind, &conditions).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), Some(&Value::Int(1)));
        assert_eq!(
            store.calls(),
            vec![StoreCall::FindCustom { kind, conditions }]
        );
    }
}
