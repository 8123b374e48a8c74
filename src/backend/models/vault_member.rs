// src/backend/models/vault_member.rs
use crate::models::common::{MemberStatus, Role, Timestamp, UserId};
use crate::models::{decode_tag, StoredRecord};
use crate::remote::{Document, Fields, SchemaError, Value};
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// Membership record at `vaults/{vault_id}/members/{user_id}`. Never
/// hard-deleted.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct VaultMember {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub avatar: String,
    pub role: Role,
    pub status: MemberStatus,
    pub joined_at: Timestamp,
}

impl VaultMember {
    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

impl StoredRecord for VaultMember {
    fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        Ok(Self {
            id: doc.id().to_string(),
            email: doc.text_or_default("email")?,
            name: doc.text_or_default("name")?,
            avatar: doc.text_or_default("avatar")?,
            role: decode_tag(doc, "role", Role::parse)?,
            status: decode_tag(doc, "status", MemberStatus::parse)?,
            joined_at: doc.timestamp("joinedAt")?,
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("email".into(), Value::text(&self.email));
        fields.insert("name".into(), Value::text(&self.name));
        fields.insert("avatar".into(), Value::text(&self.avatar));
        fields.insert("role".into(), Value::text(self.role.as_str()));
        fields.insert("status".into(), Value::text(self.status.as_str()));
        fields.insert("joinedAt".into(), Value::timestamp(self.joined_at));
        fields
    }
}
