//! # Plugkit Core Storage
//!
//! Loads and saves [`PluginSettings`], the persisted part of the plugin
//! runtime's configuration: extra search paths and per-plugin enablement
//! overrides. The file format is picked from the file extension, see
//! [`ConfigFormat`].
pub mod config;
pub mod error;

pub use config::{ConfigFormat, PluginSettings};
pub use error::StorageSystemError;
