//! `salesdesk-core`: shared building blocks.
//!
//! This crate contains **pure** primitives (no IO): identifiers, the entity
//! kinds kept in the local mirror, and the declarative record schema used to
//! normalise remote rows.

pub mod error;
pub mod id;
pub mod kind;
pub mod schema;

pub use error::{DomainError, DomainResult};
pub use id::{RecordId, UserId};
pub use kind::EntityKind;
pub use schema::{FieldDefault, FieldSpec, FieldType, Presence, RecordSchema};
