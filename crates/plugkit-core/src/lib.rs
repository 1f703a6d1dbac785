//! # Plugkit Core
//!
//! Extension runtime for desktop host applications: discovers plugin
//! descriptors on disk, resolves the dependencies between them, and drives
//! every plugin through a fixed lifecycle.
pub mod kernel;
pub mod plugin_system;
pub mod storage;

// Re-export key public types/traits for easier use by the binary and plugins
pub use kernel::Application;
pub use kernel::error::Error as KernelError;
pub use plugin_system::{
    Plugin, PluginContext, PluginDescriptor, PluginError, PluginManager, PluginRegistry,
    PluginState, PluginVersion,
};
pub use storage::PluginSettings;
