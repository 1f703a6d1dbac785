use std::any::Any;
use std::sync::Weak;

use crate::plugin_system::dependency::DependencyGraph;
use crate::plugin_system::descriptor::{PluginDescriptor, PluginState, PluginStatus};
use crate::plugin_system::error::ResolutionError;
use crate::plugin_system::lifecycle::LifecycleController;
use crate::plugin_system::loader::LibraryLoader;
use crate::plugin_system::object_pool::ObjectPool;
use crate::plugin_system::resolver::{self, LoadOrder};

/// Every known plugin descriptor, plus what the runtime derived from them.
///
/// Descriptors live in an arena; their index is a stable handle for the life
/// of the registry. A new discovery pass starts from a fresh registry.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    descriptors: Vec<PluginDescriptor>,
    objects: ObjectPool,
    graph: DependencyGraph,
    load_order: LoadOrder,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor and return its index. A second descriptor with the
    /// same name and version is kept, but as `Invalid`.
    pub fn add(&mut self, mut descriptor: PluginDescriptor) -> usize {
        if descriptor.state() != PluginState::Invalid {
            let duplicate = self.descriptors.iter().find(|existing| {
                existing.state() != PluginState::Invalid
                    && existing.name == descriptor.name
                    && existing.version == descriptor.version
            });
            if let Some(existing) = duplicate {
                let found_in = existing
                    .descriptor_path()
                    .unwrap_or_else(|| existing.location())
                    .display()
                    .to_string();
                let message = format!(
                    "Plugin '{}' was already found in {}",
                    existing.display_name(),
                    found_in
                );
                descriptor.fail(message);
            }
        }
        self.descriptors.push(descriptor);
        self.descriptors.len() - 1
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PluginDescriptor> {
        self.descriptors.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PluginDescriptor> {
        self.descriptors.get_mut(index)
    }

    /// Index of the first descriptor named `name`, in discovery order
    pub fn find(&self, name: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.name == name)
    }

    pub fn find_descriptor(&self, name: &str) -> Option<&PluginDescriptor> {
        self.find(name).and_then(|index| self.descriptors.get(index))
    }

    pub fn descriptors(&self) -> &[PluginDescriptor] {
        &self.descriptors
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.descriptors.iter()
    }

    /// Resolve every descriptor still in state `Read`. Plugins resolved by
    /// an earlier call keep their place: the newly resolved ones are appended
    /// to the load order.
    pub fn resolve(&mut self) -> Vec<ResolutionError> {
        let resolution = resolver::resolve(&mut self.descriptors);
        self.graph = resolution.graph;
        self.load_order.extend(resolution.load_order);
        resolution.errors
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn load_order(&self) -> &LoadOrder {
        &self.load_order
    }

    /// Lifecycle controller over this registry's plugins
    pub fn controller<'a>(&'a mut self, loader: &'a dyn LibraryLoader) -> LifecycleController<'a> {
        LifecycleController::new(&mut self.descriptors, &mut self.objects, &self.graph, loader)
    }

    /// Diagnostic snapshot of every descriptor, in discovery order
    pub fn statuses(&self) -> Vec<PluginStatus> {
        self.descriptors.iter().map(PluginDescriptor::status).collect()
    }

    /// Descriptors that ended up `Invalid`, with their error messages
    pub fn errors(&self) -> Vec<(&str, &str)> {
        self.descriptors
            .iter()
            .filter_map(|d| d.error_message().map(|msg| (d.name.as_str(), msg)))
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.descriptors.iter().any(PluginDescriptor::has_error)
    }

    /// Indices of the plugins currently in `state`
    pub fn in_state(&self, state: PluginState) -> Vec<usize> {
        self.descriptors
            .iter()
            .enumerate()
            .filter_map(|(idx, d)| (d.state() == state).then_some(idx))
            .collect()
    }

    pub fn objects(&self) -> &ObjectPool {
        &self.objects
    }

    /// Weak reference to an object some plugin published
    pub fn get_object<T: Any + Send + Sync>(&self, name: &str) -> Option<Weak<T>> {
        self.objects.get::<T>(name)
    }
}
