use keystone_core::{
    Conditions, Entity, EntityType, Kind, MemoryDatastore, Properties, RelationOptions, StoreCall,
    Value,
};
use std::sync::Arc;

struct Post;

impl EntityType for Post {
    const TYPE_NAME: &'static str = "Post";
}

fn props(pairs: &[(&str, Value)]) -> Properties {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

struct Movie;

impl EntityType for Movie {
    const TYPE_NAME: &'static str = "Movie";
}

struct Bus;

impl EntityType for Bus {
    const TYPE_NAME: &'static str = "Bus";
}

struct OrderStatus;

impl EntityType for OrderStatus {
    const TYPE_NAME: &'static str = "OrderStatus";
}

fn post(store: &Arc<MemoryDatastore>, pairs: &[(&str, Value)]) -> Entity<Post> {
    Entity::builder()
        .properties(props(pairs))
        .datastore(store.clone())
        .build()
}

#[test]
fn belongs_to_without_foreign_key_makes_no_calls() {
    let store = Arc::new(MemoryDatastore::new());
    let entity = post(&store, &[("id", Value::Int(1))]);

    let found = entity.belongs_to("author", RelationOptions::new()).unwrap();

    assert!(found.is_none());
    assert_eq!(store.call_count(), 0);
}

#[test]
fn belongs_to_with_null_foreign_key_makes_no_calls() {
    let store = Arc::new(MemoryDatastore::new());
    let entity = post(&store, &[("id", Value::Int(1)), ("author_id", Value::Null)]);

    assert!(entity
        .belongs_to("author", RelationOptions::new())
        .unwrap()
        .is_none());
    assert_eq!(store.call_count(), 0);
}

#[test]
fn belongs_to_resolves_by_conventional_key() {
    let store = Arc::new(MemoryDatastore::new());
    store.seed(
        &Kind::new("authors"),
        props(&[("id", Value::Int(5)), ("name", "ada".into())]),
    );
    let entity = post(&store, &[("id", Value::Int(1)), ("author_id", Value::Int(5))]);

    let author = entity
        .belongs_to("author", RelationOptions::new())
        .unwrap()
        .unwrap();

    assert_eq!(author.kind.as_str(), "authors");
    assert_eq!(author.get("name"), Some(&Value::from("ada")));
    assert_eq!(
        store.calls(),
        vec![StoreCall::Find {
            kind: Kind::new("authors"),
            id: Value::Int(5),
        }]
    );
}

#[test]
fn belongs_to_honours_foreign_key_override() {
    let store = Arc::new(MemoryDatastore::new());
    store.seed(&Kind::new("users"), props(&[("id", Value::Int(9))]));
    let entity = post(&store, &[("id", Value::Int(1)), ("written_by", Value::Int(9))]);

    let writer = entity
        .belongs_to("user", RelationOptions::new().foreign_key("written_by"))
        .unwrap();
    assert_eq!(writer.unwrap().id(), Some(&Value::Int(9)));
}

#[test]
fn has_many_filters_by_this_entity_id_and_merges_conditions() {
    let store = Arc::new(MemoryDatastore::new());
    let comments = Kind::new("comments");
    store.seed(
        &comments,
        props(&[("id", Value::Int(1)), ("post_id", Value::Int(42)), ("state", "live".into())]),
    );
    store.seed(
        &comments,
        props(&[("id", Value::Int(2)), ("post_id", Value::Int(42)), ("state", "spam".into())]),
    );
    store.seed(
        &comments,
        props(&[("id", Value::Int(3)), ("post_id", Value::Int(7)), ("state", "live".into())]),
    );
    let entity = post(&store, &[("id", Value::Int(42))]);

    let found = entity
        .has_many("comment", RelationOptions::new().condition("state", "live"))
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), Some(&Value::Int(1)));

    let mut expected = Conditions::new();
    expected.insert("post_id".into(), Value::Int(42));
    expected.insert("state".into(), Value::from("live"));
    assert_eq!(
        store.calls(),
        vec![StoreCall::FindCustom {
            kind: comments,
            conditions: expected,
        }]
    );
}

#[test]
fn has_many_key_condition_wins_over_caller_condition() {
    let store = Arc::new(MemoryDatastore::new());
    let entity = post(&store, &[("id", Value::Int(42))]);

    entity
        .has_many("comment", RelationOptions::new().condition("post_id", 1))
        .unwrap();

    match &store.calls()[0] {
        StoreCall::FindCustom { conditions, .. } => {
            assert_eq!(conditions.get("post_id"), Some(&Value::Int(42)));
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

fn has_many_key_for<T: EntityType>() -> Vec<String> {
    let store = Arc::new(MemoryDatastore::new());
    let entity: Entity<T> = Entity::builder()
        .properties(props(&[("id", Value::Int(1))]))
        .datastore(store.clone())
        .build();

    entity.has_many("review", RelationOptions::new()).unwrap();

    match &store.calls()[0] {
        StoreCall::FindCustom { kind, conditions } => {
            assert_eq!(kind, &Kind::new("reviews"));
            conditions.keys().cloned().collect()
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[test]
fn has_many_default_key_comes_from_the_declared_type_name() {
    assert_eq!(has_many_key_for::<Movie>(), vec!["movie_id"]);
    assert_eq!(has_many_key_for::<Bus>(), vec!["bus_id"]);
    assert_eq!(has_many_key_for::<OrderStatus>(), vec!["order_status_id"]);
}

#[test]
fn has_many_on_new_entity_returns_empty_without_calls() {
    let store = Arc::new(MemoryDatastore::new());
    let entity = post(&store, &[("title", "draft".into())]);

    assert!(entity
        .has_many("comment", RelationOptions::new())
        .unwrap()
        .is_empty());
    assert_eq!(store.call_count(), 0);
}

#[test]
fn explicit_datastore_is_queried_instead_of_bound_one() {
    let bound_store = Arc::new(MemoryDatastore::new());
    let other = MemoryDatastore::new();
    other.seed(&Kind::new("authors"), props(&[("id", Value::Int(5))]));
    let entity = post(&bound_store, &[("author_id", Value::Int(5))]);

    let found = entity
        .belongs_to("author", RelationOptions::new().datastore(&other))
        .unwrap();

    assert!(found.is_some());
    assert_eq!(bound_store.call_count(), 0);
    assert_eq!(other.call_count(), 1);
}
