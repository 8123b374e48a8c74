// src/backend/models/identity.rs
use crate::models::common::{Timestamp, UserId};
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// The signed-in user as supplied by the identity provider.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub display_name: Option<String>,
    /// Verified email, when the provider has one.
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: Timestamp,
    pub last_sign_in_at: Timestamp,
}

impl Identity {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
            avatar_url: None,
            created_at: 0,
            last_sign_in_at: 0,
        }
    }

    /// Display name, else the local part of the email, else `fallback`.
    pub fn name_or(&self, fallback: &str) -> String {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
            })
            .unwrap_or(fallback)
            .to_string()
    }

    pub fn avatar(&self) -> String {
        self.avatar_url.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_falls_back_to_email_then_default() {
        let mut identity = Identity::new("u1");
        assert_eq!(identity.name_or("User"), "User");
        identity.email = Some("rosa@example.com".into());
        assert_eq!(identity.name_or("User"), "rosa");
        identity.display_name = Some("Rosa Diaz".into());
        assert_eq!(identity.name_or("User"), "Rosa Diaz");
    }
}
