// src/backend/models/comment.rs
use crate::models::common::{CommentId, MemoryId, Timestamp, UserId};
use crate::models::StoredRecord;
use crate::remote::{Document, Fields, SchemaError, Value};
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// Append-only comment in `memories/{memory_id}/comments`.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub memory_id: MemoryId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar: String,
    pub content: String,
    pub created_at: Timestamp,
}

impl StoredRecord for Comment {
    fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        Ok(Self {
            id: doc.id().to_string(),
            memory_id: doc.text("memoryId")?,
            author_id: doc.text("userId")?,
            author_name: doc.text_or_default("userName")?,
            author_avatar: doc.text_or_default("userAvatar")?,
            content: doc.text("content")?,
            created_at: doc.timestamp("createdAt")?,
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("memoryId".into(), Value::text(&self.memory_id));
        fields.insert("userId".into(), Value::text(&self.author_id));
        fields.insert("userName".into(), Value::text(&self.author_name));
        fields.insert("userAvatar".into(), Value::text(&self.author_avatar));
        fields.insert("content".into(), Value::text(&self.content));
        fields.insert("createdAt".into(), Value::timestamp(self.created_at));
        fields
    }
}
