//! Core types shared by the remote entity generator
//!
//! This crate provides the vocabulary every other crate speaks: entity ids,
//! slug normalization, the entity types the generator can emit and the kinds
//! of synthetic state used to remember what a feedback-less device is doing.

mod domains;
mod entity_id;
mod slug;

pub use domains::{EntityType, StateKind, UnknownEntityType};
pub use entity_id::{EntityId, EntityIdError};
pub use slug::{is_slug, slugify, EMPTY_SLUG};
