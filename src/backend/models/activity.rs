// src/backend/models/activity.rs
use crate::models::common::{ActivityId, Timestamp};
use crate::models::StoredRecord;
use crate::remote::{Document, Fields, SchemaError, Value};
use candid::CandidType;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ACTOR: &str = "Unknown User";
pub const DEFAULT_AVATAR: &str = "/default-avatar.png";
pub const DEFAULT_ACTION: &str = "performed an action";

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ActivityEntry {
    pub id: ActivityId,
    pub actor: String,
    pub avatar: String,
    pub action: String,
    pub target: Option<String>,
    pub kind: Option<String>,
    pub timestamp: Timestamp,
}

/// What happened, as reported by the acting service.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityDraft {
    pub actor: String,
    pub avatar: String,
    pub action: String,
    pub target: Option<String>,
    pub kind: Option<String>,
}

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

impl ActivityDraft {
    pub fn into_entry(self, timestamp: Timestamp) -> ActivityEntry {
        ActivityEntry {
            id: String::new(),
            actor: or_default(&self.actor, DEFAULT_ACTOR),
            avatar: or_default(&self.avatar, DEFAULT_AVATAR),
            action: or_default(&self.action, DEFAULT_ACTION),
            target: self.target.filter(|t| !t.trim().is_empty()),
            kind: self.kind.filter(|k| !k.trim().is_empty()),
            timestamp,
        }
    }
}

impl StoredRecord for ActivityEntry {
    fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        Ok(Self {
            id: doc.id().to_string(),
            actor: doc.text_or_default("user")?,
            avatar: doc.text_or_default("avatar")?,
            action: doc.text_or_default("action")?,
            target: doc.optional_text("target")?,
            kind: doc.optional_text("type")?,
            timestamp: doc.timestamp("timestamp")?,
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("user".into(), Value::text(&self.actor));
        fields.insert("avatar".into(), Value::text(&self.avatar));
        fields.insert("action".into(), Value::text(&self.action));
        if let Some(target) = &self.target {
            fields.insert("target".into(), Value::text(target));
        }
        if let Some(kind) = &self.kind {
            fields.insert("type".into(), Value::text(kind));
        }
        fields.insert("timestamp".into(), Value::timestamp(self.timestamp));
        fields
    }
}
