// src/backend/utils/rng.rs
use ic_cdk::api::management_canister::main::raw_rand;

const CLAIM_CODE_BYTES: usize = 16;

/// Fresh invitation claim code drawn from the subnet's randomness beacon.
pub async fn random_claim_code() -> Result<String, String> {
    let raw: Result<(Vec<u8>,), _> = raw_rand().await;
    match raw {
        Ok((bytes,)) if bytes.len() >= CLAIM_CODE_BYTES => Ok(hex::encode(&bytes[..CLAIM_CODE_BYTES])),
        Ok(_) => Err("raw_rand returned insufficient bytes".to_string()),
        Err((code, msg)) => Err(format!("Failed to get raw_rand: {:?} {}", code, msg)),
    }
}
