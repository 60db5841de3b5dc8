use keystone_core::{Entity, EntityType, Properties, SchemaError, SchemaRegistry};
use std::sync::Arc;

struct Post;

impl EntityType for Post {
    const TYPE_NAME: &'static str = "Post";
}

const JSON_SCHEMA: &str = r#"{
    "posts": {
        "title": "string",
        "author_id": {"type": "int", "indexed": true},
        "published_at": {"type": "DateTime", "indexed": true}
    },
    "tags": {}
}"#;

const TOML_SCHEMA: &str = r#"
[posts]
title = "string"
author_id = { type = "int", indexed = true }
"#;

#[test]
fn loads_json_document_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.json");
    std::fs::write(&path, JSON_SCHEMA).unwrap();

    let registry = SchemaRegistry::load(&path).unwrap();

    assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["posts", "tags"]);
    assert_eq!(
        registry.indexed_fields("posts"),
        vec!["author_id", "published_at"]
    );
    assert_eq!(
        registry.field("posts", "published_at").unwrap().field_type,
        "datetime"
    );
    assert!(registry.entry("tags").unwrap().fields().next().is_none());
}

#[test]
fn loads_toml_document_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.toml");
    std::fs::write(&path, TOML_SCHEMA).unwrap();

    let registry = SchemaRegistry::load(&path).unwrap();
    assert!(!registry.field("posts", "title").unwrap().indexed);
    assert!(registry.field("posts", "author_id").unwrap().indexed);
}

#[test]
fn rejects_unknown_document_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.yaml");
    std::fs::write(&path, "posts: {}").unwrap();

    let err = SchemaRegistry::load(&path).unwrap_err();
    assert!(matches!(err, SchemaError::UnsupportedFormat(ref ext) if ext == "yaml"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SchemaRegistry::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, SchemaError::Io(_)));
}

#[test]
fn entity_sees_schema_for_its_kind() {
    let registry = Arc::new(SchemaRegistry::from_json_str(JSON_SCHEMA).unwrap());
    let post: Entity<Post> = Entity::builder().schema(registry).build();

    let schema = post.schema().unwrap();
    assert_eq!(schema.indexed_fields(), vec!["author_id", "published_at"]);
    assert_eq!(post.field_schema("title").unwrap().field_type, "string");
    assert!(post.field_schema("body").is_none());
}

#[test]
fn entity_without_registry_has_no_schema() {
    let post: Entity<Post> = Entity::new(Properties::new());
    assert!(post.schema().is_none());
    assert!(post.field_schema("title").is_none());
}
