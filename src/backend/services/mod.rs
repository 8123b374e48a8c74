// src/backend/services/mod.rs
pub mod activity_service;
pub mod engagement_service;
pub mod invite_service;
pub mod member_service;
pub mod memory_service;
pub mod query;
pub mod resilience;
pub mod settings_service;
pub mod visibility;

use crate::models::StoredRecord;
use crate::remote::Document;

/// Decodes every document, dropping (and logging) the ones that fail the
/// schema check. Listing never fails because of one bad record.
pub(crate) fn decode_all<T: StoredRecord>(docs: Vec<Document>) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match T::from_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                log_warn!("Skipping malformed record {}", e);
                None
            }
        })
        .collect()
}
