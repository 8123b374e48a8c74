// src/backend/models/invitation.rs
use crate::error::LegacyError;
use crate::models::common::{InvitationId, InviteStatus, Role, Timestamp, UserId, VaultId};
use crate::models::{decode_tag, StoredRecord};
use crate::remote::{Document, Fields, SchemaError, Value};
use candid::CandidType;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Invitation {
    pub id: InvitationId,
    pub email: String,
    pub role: Role,
    pub status: InviteStatus,
    pub invited_by_user_id: UserId,
    pub invited_by_user_name: String,
    pub vault_id: VaultId,
    pub created_at: Timestamp,
    pub accepted_at: Option<Timestamp>,
}

impl InviteStatus {
    /// An invitation leaves `Pending` exactly once and never changes after.
    pub fn transition(self, next: InviteStatus) -> Result<InviteStatus, LegacyError> {
        match (self, next) {
            (InviteStatus::Pending, InviteStatus::Accepted | InviteStatus::Declined) => Ok(next),
            (from, to) => Err(LegacyError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            }),
        }
    }
}

/// Emails are compared case-insensitively everywhere.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl StoredRecord for Invitation {
    fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        Ok(Self {
            id: doc.id().to_string(),
            email: doc.text("email")?,
            role: decode_tag(doc, "role", Role::parse)?,
            status: decode_tag(doc, "status", InviteStatus::parse)?,
            invited_by_user_id: doc.text("invitedByUserId")?,
            invited_by_user_name: doc.text_or_default("invitedByUserName")?,
            vault_id: doc.text("vaultId")?,
            created_at: doc.timestamp("createdAt")?,
            accepted_at: doc.optional_timestamp("acceptedAt")?,
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("email".into(), Value::text(&self.email));
        fields.insert("role".into(), Value::text(self.role.as_str()));
        fields.insert("status".into(), Value::text(self.status.as_str()));
        fields.insert("invitedByUserId".into(), Value::text(&self.invited_by_user_id));
        fields.insert("invitedByUserName".into(), Value::text(&self.invited_by_user_name));
        fields.insert("vaultId".into(), Value::text(&self.vault_id));
        fields.insert("createdAt".into(), Value::timestamp(self.created_at));
        if let Some(accepted_at) = self.accepted_at {
            fields.insert("acceptedAt".into(), Value::timestamp(accepted_at));
        }
        fields
    }
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct NewInvitation {
    #[validate(length(min = 1, max = 100))]
    pub vault_id: VaultId,
    #[validate(email)]
    pub email: String,
    pub role: Role,
}
