// src/backend/utils/crypto.rs
use sha2::{Digest, Sha256};

const DOCUMENT_ID_LEN: usize = 20;

/// Calculates the SHA256 hash of byte data and returns it as a hex string.
pub fn calculate_sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Derives a store-generated document id from the collection path and a
/// monotonically increasing sequence number.
pub fn document_id(collection: &str, sequence: u64) -> String {
    let mut digest = calculate_sha256_hex(format!("{}:{}", collection, sequence).as_bytes());
    digest.truncate(DOCUMENT_ID_LEN);
    digest
}

/// Stored form of an invitation claim code.
pub fn claim_hash(claim_code: &str) -> String {
    calculate_sha256_hex(format!("invitation-claim:{}", claim_code).as_bytes())
}
