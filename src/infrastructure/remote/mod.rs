pub mod memory_store;
pub mod rest_store;

pub use memory_store::MemoryRemoteStore;
pub use rest_store::RestRemoteStore;
