pub mod recorder;

pub use recorder::{ConnectionStatus, MAX_NAME_SUFFIX, RecordStore};
