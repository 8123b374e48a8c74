// src/backend/utils/mod.rs
#[macro_use]
pub mod log;
pub mod crypto;
pub mod guards;
pub mod rng;
