//! Entity model: values, kinds, the entity aggregate and its relations.
//!
//! # Responsibility
//! - Define the dynamic property shape every entity carries.
//! - Derive storage kinds and foreign keys from type names.
//! - Own per-entity state, validation and the save protocol.
//!
//! # Invariants
//! - Each concrete entity type declares its name once (`EntityType`).
//! - Property state is only mutated through `Entity` methods.

pub mod entity;
pub mod inflect;
pub mod kind;
pub mod relation;
pub mod value;
