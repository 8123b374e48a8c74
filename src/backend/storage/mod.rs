// src/backend/storage/mod.rs
// Stable memory layout and the document store kept in it.

pub mod config;
pub mod documents;
pub mod memory;
pub mod metrics;
pub mod storable;

pub use config::{get_config, init_config, update_config, IndexDeclaration, LegacyConfig};
pub use documents::StableStore;
pub use memory::StableMemory;
pub use metrics::{get_metrics, update_metrics};
pub use storable::Cbor;
