// src/backend/models/common.rs
use candid::CandidType;
use serde::{Deserialize, Serialize};

pub type VaultId = String;
pub type MemoryId = String;
pub type CommentId = String;
pub type InvitationId = String;
pub type UserId = String;
pub type ActivityId = String;

pub type Timestamp = u64; // Nanoseconds since epoch

/// Who may see a memory.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum Privacy {
    AutoApproved,  // Visible to every member at once
    AdminReviewed, // Hidden until an owner approves it
    Personal,      // Only the uploader sees it
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::AutoApproved => "auto-approved",
            Privacy::AdminReviewed => "admin-reviewed",
            Privacy::Personal => "personal",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "auto-approved" => Some(Privacy::AutoApproved),
            "admin-reviewed" => Some(Privacy::AdminReviewed),
            "personal" => Some(Privacy::Personal),
            _ => None,
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Text,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Text => "text",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            "text" => Some(MediaKind::Text),
            _ => None,
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "owner" => Some(Role::Owner),
            "editor" => Some(Role::Editor),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum MemberStatus {
    Active,
    Pending,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Pending => "pending",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "active" => Some(MemberStatus::Active),
            "pending" => Some(MemberStatus::Pending),
            _ => None,
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Declined => "declined",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "pending" => Some(InviteStatus::Pending),
            "accepted" => Some(InviteStatus::Accepted),
            "declined" => Some(InviteStatus::Declined),
            _ => None,
        }
    }
}
