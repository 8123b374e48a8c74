// src/backend/services/settings_service.rs
use crate::error::LegacyError;
use crate::models::common::UserId;
use crate::models::vault_settings::VaultSettings;
use crate::models::StoredRecord;
use crate::remote::{collections, DocumentPath, DocumentStore};
use crate::runtime::Runtime;
use crate::session::Session;
use std::cell::RefCell;
use std::collections::BTreeMap;

const CACHE_KEY: &str = "legacy_vault_settings";
const MAX_NAME_LEN: usize = 100;

/// Local key-value store holding a non-authoritative copy of each user's
/// settings.
pub trait SettingsCache {
    fn get(&self, key: &str) -> Result<Option<String>, String>;
    fn put(&self, key: &str, value: String) -> Result<(), String>;
    fn remove(&self, key: &str) -> Result<(), String>;
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: RefCell<BTreeMap<String, String>>,
}

impl SettingsCache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn put(&self, key: &str, value: String) -> Result<(), String> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

fn cache_key(user_id: &str) -> String {
    format!("{}/{}", CACHE_KEY, user_id)
}

fn settings_path(user_id: &str) -> DocumentPath {
    DocumentPath::new(collections::SETTINGS, user_id)
}

fn read_cached(cache: &dyn SettingsCache, user_id: &str) -> Option<VaultSettings> {
    match cache.get(&cache_key(user_id)) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(settings) => Some(settings),
            Err(e) => {
                log_warn!("Discarding unreadable cached settings for {}: {}", user_id, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log_warn!("Settings cache read failed for {}: {}", user_id, e);
            None
        }
    }
}

fn write_cached(cache: &dyn SettingsCache, user_id: &str, settings: &VaultSettings) {
    let result = serde_json::to_string(settings)
        .map_err(|e| e.to_string())
        .and_then(|raw| cache.put(&cache_key(user_id), raw));
    if let Err(e) = result {
        log_warn!("Settings cache write failed for {}: {}", user_id, e);
    }
}

/// The remote document wins and refreshes the cache. Without one, or when
/// the store cannot be reached, the cached copy is used, then the default.
pub async fn load_vault_settings<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    cache: &dyn SettingsCache,
) -> Result<VaultSettings, LegacyError> {
    let requester = session.requester()?;
    let path = settings_path(&requester.id);
    let path = &path;
    let store = session.store();
    let remote = match session.call("load_vault_settings", move || store.get(path)).await {
        Ok(doc) => doc.and_then(|d| match VaultSettings::from_document(&d) {
            Ok(settings) => Some(settings),
            Err(e) => {
                log_warn!("Ignoring malformed settings for {}: {}", requester.id, e);
                None
            }
        }),
        Err(e) => {
            log_warn!("Loading settings for {} failed, using cache: {}", requester.id, e);
            None
        }
    };

    if let Some(settings) = remote {
        write_cached(cache, &requester.id, &settings);
        return Ok(settings);
    }
    Ok(read_cached(cache, &requester.id)
        .unwrap_or_else(|| VaultSettings::default_for(requester.display_name.as_deref())))
}

pub async fn save_vault_settings<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    cache: &dyn SettingsCache,
    name: &str,
    background_image: &str,
) -> Result<VaultSettings, LegacyError> {
    let requester = session.requester()?;
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(LegacyError::InvalidInput(format!(
            "Vault name must be 1 to {} characters",
            MAX_NAME_LEN
        )));
    }
    let settings = VaultSettings {
        name: name.to_string(),
        background_image: background_image.trim().to_string(),
        last_updated: session.now(),
    };
    write_cached(cache, &requester.id, &settings);

    let path = settings_path(&requester.id);
    let path = &path;
    let fields = settings.to_fields();
    let store = session.store();
    session
        .call("save_vault_settings", move || store.set(path, fields.clone(), true))
        .await
        .map_err(|e| LegacyError::save_failed("save_vault_settings", e))?;
    log_info!("Vault settings saved for {}", requester.id);
    Ok(settings)
}

pub fn clear_cached_settings(cache: &dyn SettingsCache, user_id: &UserId) {
    if let Err(e) = cache.remove(&cache_key(user_id)) {
        log_warn!("Settings cache clear failed for {}: {}", user_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::StoreError;
    use crate::testing::{fresh_store, identity, session_as, session_over, FaultyStore, Op};
    use futures::executor::block_on;
    use std::rc::Rc;

    struct BrokenCache;

    impl SettingsCache for BrokenCache {
        fn get(&self, _: &str) -> Result<Option<String>, String> {
            Err("quota exceeded".into())
        }
        fn put(&self, _: &str, _: String) -> Result<(), String> {
            Err("quota exceeded".into())
        }
        fn remove(&self, _: &str) -> Result<(), String> {
            Err("quota exceeded".into())
        }
    }

    #[test]
    fn defaults_until_saved_then_remote_wins() {
        let store = Rc::new(fresh_store());
        let (session, _) = session_over(store, Some(identity("ana", "Ana Silva", "ana@example.com")));
        let cache = InMemoryCache::default();
        block_on(async {
            let initial = load_vault_settings(&session, &cache).await.unwrap();
            assert_eq!(initial.name, "The Ana Family Vault");

            let saved = save_vault_settings(&session, &cache, "  Silva Archive ", "/bg/sea.jpg")
                .await
                .unwrap();
            assert_eq!(saved.name, "Silva Archive");

            // A stale cache entry is overwritten by the remote document.
            cache.put(&cache_key("ana"), "{\"name\":\"stale\",\"background_image\":\"\",\"last_updated\":0}".into()).unwrap();
            assert_eq!(load_vault_settings(&session, &cache).await.unwrap(), saved);
            assert_eq!(read_cached(&cache, "ana"), Some(saved));
        });
    }

    #[test]
    fn cache_serves_while_the_store_is_down() {
        let store = Rc::new(FaultyStore::new(fresh_store()));
        let (session, _) = session_over(store.clone(), Some(identity("ana", "Ana", "ana@example.com")));
        let cache = InMemoryCache::default();
        block_on(async {
            let saved = save_vault_settings(&session, &cache, "Ours", "").await.unwrap();
            store.fail_next(Op::Get, StoreError::permission_denied("Missing or insufficient permissions."));
            assert_eq!(load_vault_settings(&session, &cache).await.unwrap(), saved);
        });
    }

    #[test]
    fn caches_are_per_user_and_clearable() {
        let store = Rc::new(fresh_store());
        let (ana, runtime) = session_over(store.clone(), Some(identity("ana", "Ana", "ana@example.com")));
        let ben = session_as(&store, &runtime, identity("ben", "Ben", "ben@example.com"));
        let cache = InMemoryCache::default();
        block_on(async {
            save_vault_settings(&ana, &cache, "Ana's", "").await.unwrap();
            assert_eq!(load_vault_settings(&ben, &cache).await.unwrap().name, "The Ben Family Vault");
        });
        clear_cached_settings(&cache, &"ana".to_string());
        assert_eq!(read_cached(&cache, "ana"), None);
    }

    #[test]
    fn cache_failures_are_not_fatal_but_blank_names_are() {
        let (session, _) = session_over(Rc::new(fresh_store()), Some(identity("ana", "Ana", "ana@example.com")));
        block_on(async {
            let saved = save_vault_settings(&session, &BrokenCache, "Ours", "").await.unwrap();
            assert_eq!(load_vault_settings(&session, &BrokenCache).await.unwrap(), saved);
            assert!(matches!(
                save_vault_settings(&session, &BrokenCache, "   ", "").await,
                Err(LegacyError::InvalidInput(_))
            ));
        });
        clear_cached_settings(&BrokenCache, &"ana".to_string());
    }
}
