pub mod error;
pub mod model;
pub mod path;

pub use error::{RecorderError, Result};
pub use model::{Container, Record};
