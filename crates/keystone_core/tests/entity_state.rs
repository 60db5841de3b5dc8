use chrono::{TimeZone, Utc};
use keystone_core::{Entity, EntityError, EntityType, Properties, Value};
use serde_json::json;

struct Article;

impl EntityType for Article {
    const TYPE_NAME: &'static str = "Article";
}

fn props(pairs: &[(&str, Value)]) -> Properties {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn hydrated() -> Entity<Article> {
    Entity::new(props(&[("id", Value::Int(1)), ("title", "x".into())]))
}

#[test]
fn hydrated_entity_is_clean_and_not_new() {
    let article = hydrated();

    assert!(!article.is_dirty());
    assert!(!article.is_new());
    assert_eq!(article.id(), Some(&Value::Int(1)));
    assert_eq!(article.kind().as_str(), "articles");
}

#[test]
fn set_stages_writes_without_touching_persisted_state() {
    let mut article = hydrated();
    article.set("title", "y").set("body", "hello");

    assert!(article.is_dirty());
    assert_eq!(article.get("title").unwrap(), Value::from("y"));
    assert_eq!(
        article.dirty_properties(),
        &props(&[("title", "y".into()), ("body", "hello".into())])
    );
    assert_eq!(
        article.persisted_properties(),
        &props(&[("id", Value::Int(1)), ("title", "x".into())])
    );
}

#[test]
fn merged_properties_prefer_pending_values() {
    let mut article = hydrated();
    article.set("title", "y");

    assert_eq!(
        article.properties(),
        props(&[("id", Value::Int(1)), ("title", "y".into())])
    );
}

#[test]
fn has_checks_both_layers() {
    let mut article = hydrated();
    assert!(article.has("title"));
    assert!(!article.has("body"));

    article.set("body", Value::Null);
    assert!(article.has("body"));
    assert_eq!(article.get("body").unwrap(), Value::Null);
}

#[test]
fn get_of_unknown_field_is_an_error() {
    let err = hydrated().get("missing").unwrap_err();
    assert!(matches!(err, EntityError::MissingProperty { ref field, .. } if field == "missing"));
    assert_eq!(err.to_string(), "articles has no property `missing`");
}

#[test]
fn refresh_discards_pending_writes() {
    let mut article = hydrated();
    article.set("title", "changed");
    article.refresh();

    assert!(!article.is_dirty());
    assert_eq!(
        article.properties(),
        props(&[("id", Value::Int(1)), ("title", "x".into())])
    );
}

#[test]
fn new_entity_without_properties_is_new() {
    let article: Entity<Article> = Entity::new(Properties::new());
    assert!(article.is_new());
    assert!(!article.is_dirty());
    assert!(article.properties().is_empty());
}

#[test]
fn serialization_renders_timestamps_as_iso8601() {
    let published = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let mut article = hydrated();
    article.set("published_at", published);

    let expected = json!({"id": 1, "title": "x", "published_at": "2026-01-02T03:04:05Z"});
    assert_eq!(article.to_json(), expected);
    assert_eq!(serde_json::to_value(&article).unwrap(), expected);
}
