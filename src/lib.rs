// ============================================================================
// Blood Pressure Recorder Library
// ============================================================================

pub mod catalog;
pub mod config;
pub mod core;
pub mod facade;
pub mod interface;
pub mod provisioning;
pub mod report;
pub mod storage;

// Re-export main types for convenience
pub use catalog::SchemaCatalog;
pub use config::RecorderConfig;
pub use core::{Container, Record, RecorderError, Result};
pub use facade::{ConnectionStatus, RecordStore};
pub use interface::{ContentObject, QueryRequest, RemoteError, RemoteStore};
pub use provisioning::{CorrectiveAction, ProvisioningFault, SchemaProvisioner};
pub use report::render_history;

// Reference store for tests and local runs
pub use storage::{MemoryContentStore, StoreCall};
