use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::plugin_system::object_pool::ObjectPool;

/// Failure reported by a plugin. The message is recorded verbatim on the
/// plugin's descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginError(pub String);

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        PluginError(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PluginError {}

impl From<String> for PluginError {
    fn from(message: String) -> Self {
        PluginError(message)
    }
}

impl From<&str> for PluginError {
    fn from(message: &str) -> Self {
        PluginError(message.to_string())
    }
}

/// What a plugin sees of the runtime during a lifecycle call.
///
/// Gives access to the shared object pool on behalf of the plugin being
/// called.
pub struct PluginContext<'a> {
    index: usize,
    name: &'a str,
    pool: &'a mut ObjectPool,
}

impl<'a> PluginContext<'a> {
    /// Context for the plugin at arena index `index`
    pub fn new(index: usize, name: &'a str, pool: &'a mut ObjectPool) -> Self {
        Self { index, name, pool }
    }

    /// Name of the plugin this context was handed to
    pub fn plugin_name(&self) -> &str {
        self.name
    }

    /// Publish an object for other plugins. Returns false if another object
    /// already uses `name`.
    pub fn add_object<T: Any + Send + Sync>(&mut self, name: &str, object: T) -> bool {
        self.pool.add(self.index, self.name, name, Arc::new(object))
    }

    /// Look up an object published by any plugin. The reference is weak: it
    /// stops upgrading once the publisher is deleted.
    pub fn get_object<T: Any + Send + Sync>(&self, name: &str) -> Option<Weak<T>> {
        self.pool.get::<T>(name)
    }

    /// Remove an object this plugin published earlier
    pub fn remove_object(&mut self, name: &str) -> bool {
        self.pool.remove(self.index, name)
    }
}

/// The capability every plugin implements.
///
/// The runtime calls these in order: [`initialize`](Plugin::initialize) once
/// all dependencies are initialized, [`extensions_initialized`](Plugin::extensions_initialized)
/// once every plugin is initialized (dependents first), then
/// [`delayed_initialize`](Plugin::delayed_initialize) once everything runs.
/// [`about_to_shutdown`](Plugin::about_to_shutdown) is called before the
/// plugin is dropped.
pub trait Plugin: Send {
    /// `arguments` are the plugin-scoped command-line options passed to this
    /// plugin. Returning an error invalidates the plugin.
    fn initialize(
        &mut self,
        arguments: &[String],
        ctx: &mut PluginContext<'_>,
    ) -> Result<(), PluginError>;

    /// Called after every plugin was initialized, so objects published by
    /// dependents are visible here.
    fn extensions_initialized(&mut self, ctx: &mut PluginContext<'_>);

    /// Optional late work. Return true if anything was done.
    fn delayed_initialize(&mut self, _ctx: &mut PluginContext<'_>) -> bool {
        false
    }

    fn about_to_shutdown(&mut self) {}
}
