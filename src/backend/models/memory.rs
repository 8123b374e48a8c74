// src/backend/models/memory.rs
use crate::models::common::{MediaKind, MemoryId, Privacy, Timestamp, UserId, VaultId};
use crate::models::{decode_tag, StoredRecord};
use crate::remote::{Document, Fields, SchemaError, Value};
use candid::CandidType;
use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use validator::{Validate, ValidationError};

/// Reaction symbol -> users currently holding it.
pub type Reactions = BTreeMap<String, BTreeSet<UserId>>;

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Memory {
    pub id: MemoryId,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub media_kind: MediaKind,
    pub uploader_id: UserId,
    pub uploader_name: String,
    pub created_at: Timestamp,
    pub privacy: Privacy,
    /// Only meaningful for admin-reviewed memories.
    pub approved: bool,
    pub tags: Vec<String>,
    pub reactions: Reactions,
    pub vault_id: VaultId,
}

impl Memory {
    pub fn reaction_holders(&self, symbol: &str) -> Option<&BTreeSet<UserId>> {
        self.reactions.get(symbol)
    }

    /// Calendar year (UTC) the memory was created in.
    pub fn year(&self) -> i32 {
        let secs = (self.created_at / 1_000_000_000) as i64;
        let nanos = (self.created_at % 1_000_000_000) as u32;
        DateTime::from_timestamp(secs, nanos)
            .map(|at| at.year())
            .unwrap_or(1970)
    }
}

/// Memories of one calendar year.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct TimelineYear {
    pub year: i32,
    pub memories: Vec<Memory>,
}

/// Groups memories by year: newest year first, newest memory first within
/// each year.
pub fn group_by_year(memories: Vec<Memory>) -> Vec<TimelineYear> {
    let mut years: BTreeMap<i32, Vec<Memory>> = BTreeMap::new();
    for memory in memories {
        years.entry(memory.year()).or_default().push(memory);
    }
    years
        .into_iter()
        .rev()
        .map(|(year, mut memories)| {
            memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            TimelineYear { year, memories }
        })
        .collect()
}

pub(crate) fn decode_reactions(doc: &Document) -> Result<Reactions, SchemaError> {
    let Some(raw) = doc.map("reactions")? else {
        return Ok(Reactions::new());
    };
    let mut reactions = Reactions::new();
    for (symbol, value) in raw {
        let holders = match value {
            Value::Array(users) => users
                .iter()
                .map(|u| {
                    u.as_text()
                        .map(str::to_string)
                        .ok_or_else(|| doc.schema_error("reactions", "holds a non-text user id"))
                })
                .collect::<Result<BTreeSet<_>, _>>()?,
            // Older records kept a bare counter with no user ids.
            Value::Integer(_) | Value::Null => BTreeSet::new(),
            _ => return Err(doc.schema_error("reactions", format!("has a malformed `{}` entry", symbol))),
        };
        reactions.insert(symbol.clone(), holders);
    }
    Ok(reactions)
}

impl StoredRecord for Memory {
    fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        Ok(Self {
            id: doc.id().to_string(),
            title: doc.text("title")?,
            description: doc.text_or_default("description")?,
            media_url: doc.text_or_default("mediaUrl")?,
            media_kind: decode_tag(doc, "mediaType", MediaKind::parse)?,
            uploader_id: doc.text("uploaderId")?,
            uploader_name: doc.text_or_default("uploaderName")?,
            created_at: doc.timestamp("createdAt")?,
            privacy: decode_tag(doc, "privacy", Privacy::parse)?,
            approved: doc.bool_or("approved", false)?,
            tags: doc.text_list("tags")?,
            reactions: decode_reactions(doc)?,
            vault_id: doc.text("vaultId")?,
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".into(), Value::text(&self.title));
        fields.insert("description".into(), Value::text(&self.description));
        fields.insert("mediaUrl".into(), Value::text(&self.media_url));
        fields.insert("mediaType".into(), Value::text(self.media_kind.as_str()));
        fields.insert("uploaderId".into(), Value::text(&self.uploader_id));
        fields.insert("uploaderName".into(), Value::text(&self.uploader_name));
        fields.insert("createdAt".into(), Value::timestamp(self.created_at));
        fields.insert("privacy".into(), Value::text(self.privacy.as_str()));
        // The flag only exists on records that go through review.
        if self.privacy == Privacy::AdminReviewed {
            fields.insert("approved".into(), Value::Bool(self.approved));
        }
        fields.insert("tags".into(), Value::text_array(self.tags.iter().cloned()));
        fields.insert(
            "reactions".into(),
            Value::Map(
                self.reactions
                    .iter()
                    .map(|(symbol, users)| (symbol.clone(), Value::text_array(users.iter().cloned())))
                    .collect(),
            ),
        );
        fields.insert("vaultId".into(), Value::text(&self.vault_id));
        fields
    }
}

pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Input for a new memory. The media locator comes from the media host.
#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct NewMemory {
    #[validate(length(max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(length(max = 2048))]
    pub media_url: Option<String>,
    pub media_kind: MediaKind,
    pub privacy: Privacy,
    #[validate(length(max = 32))]
    pub tags: Vec<String>,
    #[validate(length(min = 1, max = 100))]
    pub vault_id: VaultId,
}

impl NewMemory {
    /// Every kind but text needs uploaded media.
    pub fn has_required_media(&self) -> bool {
        self.media_kind == MediaKind::Text
            || self
                .media_url
                .as_deref()
                .map(|url| !url.trim().is_empty())
                .unwrap_or(false)
    }
}

/// Metadata edits. Absent fields are left unchanged.
#[derive(CandidType, Deserialize, Clone, Debug, Default, Validate)]
pub struct MemoryUpdate {
    #[validate(length(max = 200), custom(function = "validate_not_blank"))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 32))]
    pub tags: Option<Vec<String>>,
}

impl MemoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.tags.is_none()
    }
}
