// src/backend/storage/memory.rs
use ic_stable_structures::memory_manager::{MemoryId, MemoryManager, VirtualMemory};
use ic_stable_structures::DefaultMemoryImpl;
use std::cell::RefCell;

// Non-overlapping ids for every stable structure
const CONFIG_MEM_ID: MemoryId = MemoryId::new(0);
const DOCUMENTS_MEM_ID: MemoryId = MemoryId::new(1);
const DOCUMENT_COUNTER_MEM_ID: MemoryId = MemoryId::new(2);
const METRICS_MEM_ID: MemoryId = MemoryId::new(3);

/// Virtual memory handed to stable structures. Named apart from the
/// `Memory` model.
pub type StableMemory = VirtualMemory<DefaultMemoryImpl>;

thread_local! {
    static MEMORY_MANAGER: RefCell<MemoryManager<DefaultMemoryImpl>> = RefCell::new(
        MemoryManager::init(DefaultMemoryImpl::default())
    );
}

/// Get memory instance for a specific MemoryId.
pub fn get_memory(id: MemoryId) -> StableMemory {
    MEMORY_MANAGER.with(|m| m.borrow().get(id))
}

pub fn get_config_memory() -> StableMemory {
    get_memory(CONFIG_MEM_ID)
}

pub fn get_documents_memory() -> StableMemory {
    get_memory(DOCUMENTS_MEM_ID)
}

pub fn get_document_counter_memory() -> StableMemory {
    get_memory(DOCUMENT_COUNTER_MEM_ID)
}

pub fn get_metrics_memory() -> StableMemory {
    get_memory(METRICS_MEM_ID)
}
