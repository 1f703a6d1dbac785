//! # Plugkit Core Plugin System
//!
//! Discovers plugin descriptors on disk, resolves the dependencies between
//! them, and drives every plugin through a fixed lifecycle.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`version`]**: [`PluginVersion`] and the compatibility rule used to
//!   match dependencies (`compatVersion <= required <= version`).
//! - **[`descriptor`]**: [`PluginDescriptor`], the metadata of one plugin plus
//!   its runtime state, and [`PluginState`].
//! - **[`parser`]**: reads and writes descriptor documents, reporting errors
//!   with file, line and column.
//! - **[`dependency`]**: the [`DependencyGraph`](dependency::DependencyGraph)
//!   over a descriptor arena, with cycle detection.
//! - **[`resolver`]**: computes the load order and invalidates plugins with
//!   unresolved or circular dependencies.
//! - **[`registry`]**: [`PluginRegistry`], the arena of descriptors together
//!   with the shared object pool.
//! - **[`traits`]**: the [`Plugin`] capability every plugin implements and the
//!   [`PluginContext`] it is handed.
//! - **[`loader`]**: opening plugin libraries, dynamic or compiled in, and
//!   the [`PluginHandle`](loader::PluginHandle) owning a live plugin.
//! - **[`lifecycle`]**: the lifecycle controller performing every state
//!   transition.
//! - **[`options`]**: the runtime's command-line options.
//! - **[`manager`]**: [`PluginManager`], which ties discovery, options,
//!   resolution and loading together.
//! - **[`error`]**: error types of all of the above.
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod manager;
pub mod object_pool;
pub mod options;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod traits;
pub mod version;

pub use descriptor::{DependencyKind, PluginDependency, PluginDescriptor, PluginState, PluginStatus};
pub use error::PluginSystemError;
pub use lifecycle::{LifecycleController, LoadReport};
pub use loader::{DynamicLibraryLoader, LibraryLoader, StaticLibraryLoader};
pub use manager::PluginManager;
pub use registry::PluginRegistry;
pub use resolver::LoadOrder;
pub use traits::{Plugin, PluginContext, PluginError};
pub use version::PluginVersion;

// Test module declaration
#[cfg(test)]
mod tests;
