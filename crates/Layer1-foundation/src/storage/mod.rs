//! Storage module for TaskWrap
//!
//! - `json`: JSON - config file save/load

mod json;

pub use json::JsonStore;
