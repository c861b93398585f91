pub mod memory;
pub mod query;

pub use memory::{MemoryContentStore, StoreCall};
