// src/backend/models/mod.rs
pub mod activity;
pub mod comment;
pub mod common;
pub mod identity;
pub mod invitation;
pub mod memory;
pub mod vault_member;
pub mod vault_settings;

pub use common::*;

use crate::remote::{Document, Fields, SchemaError};

/// An entity persisted as a document. Decoding checks every field it reads,
/// so a malformed record never reaches the service layer.
pub trait StoredRecord: Sized {
    fn from_document(doc: &Document) -> Result<Self, SchemaError>;

    fn to_fields(&self) -> Fields;
}

/// Decodes a required string tag through the enum's parser.
pub(crate) fn decode_tag<T>(
    doc: &Document,
    field: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, SchemaError> {
    let tag = doc.text(field)?;
    parse(&tag).ok_or_else(|| doc.schema_error(field, format!("has unknown value `{}`", tag)))
}
