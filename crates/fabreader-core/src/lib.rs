pub mod command_log;
pub mod constants;
pub mod duration_ms;
pub mod error;
pub mod keys;
pub mod types;

pub use command_log::CommandLog;
pub use error::{Error, Result};
pub use keys::{Key, KeySet, KeySlot};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
