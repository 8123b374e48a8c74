// src/backend/utils/guards.rs
use candid::Principal;

/// Rejects the anonymous principal. Every vault endpoint needs a signed-in
/// caller.
pub fn authenticated_guard() -> Result<(), String> {
    check_authenticated(ic_cdk::caller())
}

/// Only canister controllers may operate the store itself.
pub fn controller_guard() -> Result<(), String> {
    let caller = ic_cdk::caller();
    if ic_cdk::api::is_controller(&caller) {
        Ok(())
    } else {
        Err(format!("Caller {} is not a controller", caller))
    }
}

/// Backoff ticks are self-calls.
pub fn self_guard() -> Result<(), String> {
    check_self(ic_cdk::caller(), ic_cdk::id())
}

pub fn check_authenticated(caller: Principal) -> Result<(), String> {
    if caller == Principal::anonymous() {
        Err("Anonymous callers must sign in first".to_string())
    } else {
        Ok(())
    }
}

pub fn check_self(caller: Principal, canister: Principal) -> Result<(), String> {
    if caller == canister {
        Ok(())
    } else {
        Err(format!("Caller {} may not tick this canister", caller))
    }
}
