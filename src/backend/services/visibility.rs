// src/backend/services/visibility.rs
use crate::models::common::Privacy;
use crate::models::identity::Identity;
use crate::models::memory::Memory;

/// Whether `requester` may see `memory`. One-shot reads and live
/// subscriptions both go through here.
pub fn is_visible(memory: &Memory, requester: &Identity) -> bool {
    match memory.privacy {
        Privacy::AutoApproved => true,
        Privacy::Personal => memory.uploader_id == requester.id,
        Privacy::AdminReviewed => memory.approved,
    }
}

pub fn visible_to(memories: Vec<Memory>, requester: &Identity) -> Vec<Memory> {
    memories
        .into_iter()
        .filter(|m| is_visible(m, requester))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::MediaKind;
    use std::collections::BTreeMap;

    fn memory(privacy: Privacy, uploader: &str, approved: bool) -> Memory {
        Memory {
            id: "m1".into(),
            title: "Beach day".into(),
            description: String::new(),
            media_url: "https://media.example/beach.jpg".into(),
            media_kind: MediaKind::Photo,
            uploader_id: uploader.into(),
            uploader_name: "Ana".into(),
            created_at: 1,
            privacy,
            approved,
            tags: vec![],
            reactions: BTreeMap::new(),
            vault_id: "default-vault".into(),
        }
    }

    #[test]
    fn truth_table() {
        let alice = Identity::new("alice");
        let bob = Identity::new("bob");

        assert!(is_visible(&memory(Privacy::AutoApproved, "alice", false), &bob));
        assert!(is_visible(&memory(Privacy::Personal, "alice", false), &alice));
        assert!(!is_visible(&memory(Privacy::Personal, "alice", true), &bob));
        assert!(is_visible(&memory(Privacy::AdminReviewed, "alice", true), &bob));
        assert!(!is_visible(&memory(Privacy::AdminReviewed, "alice", false), &bob));
        // Review applies to the uploader as well.
        assert!(!is_visible(&memory(Privacy::AdminReviewed, "alice", false), &alice));
    }
}
