// src/backend/models/vault_settings.rs
use crate::models::common::Timestamp;
use crate::models::StoredRecord;
use crate::remote::{Document, Fields, SchemaError, Value};
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// Per-user vault presentation kept in `settings/{user_id}`.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct VaultSettings {
    pub name: String,
    pub background_image: String,
    pub last_updated: Timestamp,
}

impl VaultSettings {
    /// "The Smith Family Vault" from a display name like "Smith Jones".
    pub fn default_for(display_name: Option<&str>) -> Self {
        let name = display_name
            .and_then(|n| n.split_whitespace().next())
            .map(|first| format!("The {} Family Vault", first))
            .unwrap_or_else(|| "The Family Vault".to_string());
        Self {
            name,
            background_image: String::new(),
            last_updated: 0,
        }
    }
}

impl StoredRecord for VaultSettings {
    fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        Ok(Self {
            name: doc.text("name")?,
            background_image: doc.text_or_default("backgroundImage")?,
            last_updated: doc.optional_timestamp("lastUpdated")?.unwrap_or(0),
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::text(&self.name));
        fields.insert("backgroundImage".into(), Value::text(&self.background_image));
        fields.insert("lastUpdated".into(), Value::timestamp(self.last_updated));
        fields
    }
}
