//! Config - wrapper settings
//!
//! - `wrapper.rs` - `WrapperConfig` (progress bounds, report switches)

mod wrapper;

pub use wrapper::{WrapperConfig, WrapperConfigFile, WRAPPER_CONFIG_FILE};
