// crates/plugkit-core/src/plugin_system/tests/common.rs
#![cfg(test)]

use std::sync::{Arc, Mutex};

use crate::plugin_system::descriptor::{PluginDependency, PluginDescriptor};
use crate::plugin_system::lifecycle::LoadReport;
use crate::plugin_system::loader::{LibraryLoader, StaticLibraryLoader};
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::traits::{Plugin, PluginContext, PluginError};
use crate::plugin_system::version::PluginVersion;

pub fn v(text: &str) -> PluginVersion {
    PluginVersion::parse(text).unwrap()
}

/// Descriptor with required dependencies given as (name, version) pairs
pub fn descriptor(name: &str, version: &str, deps: &[(&str, &str)]) -> PluginDescriptor {
    let mut builder = PluginDescriptor::builder(name, v(version));
    for (dep_name, dep_version) in deps {
        builder = builder.dependency(PluginDependency::required(dep_name, v(dep_version)));
    }
    builder.build()
}

/// A, B depends on A 1.0, C depends on B 1.0
pub fn abc_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.add(descriptor("A", "1.0", &[]));
    registry.add(descriptor("B", "1.0", &[("A", "1.0")]));
    registry.add(descriptor("C", "1.0", &[("B", "1.0")]));
    registry
}

pub fn names(registry: &PluginRegistry, indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .map(|&idx| registry.get(idx).unwrap().name.clone())
        .collect()
}

/// Shared log of plugin calls, e.g. "init:A", "cross:A", "stop:A", "drop:A"
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Events starting with `prefix`, in order
    pub fn events_with(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct Behavior {
    pub fail_initialize: Option<String>,
    pub panic_initialize: bool,
    pub delayed: bool,
    /// Publish a `String` object named "<name>.object"
    pub publish: bool,
}

pub struct MockPlugin {
    name: String,
    recorder: Recorder,
    behavior: Behavior,
}

impl Plugin for MockPlugin {
    fn initialize(
        &mut self,
        arguments: &[String],
        ctx: &mut PluginContext<'_>,
    ) -> Result<(), PluginError> {
        self.recorder.record(format!("init:{}", self.name));
        if !arguments.is_empty() {
            self.recorder
                .record(format!("args:{}:{}", self.name, arguments.join(" ")));
        }
        if self.behavior.panic_initialize {
            panic!("boom");
        }
        if self.behavior.publish {
            ctx.add_object(&format!("{}.object", self.name), self.name.clone());
        }
        match &self.behavior.fail_initialize {
            Some(message) => Err(PluginError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn extensions_initialized(&mut self, _ctx: &mut PluginContext<'_>) {
        self.recorder.record(format!("cross:{}", self.name));
    }

    fn delayed_initialize(&mut self, _ctx: &mut PluginContext<'_>) -> bool {
        if self.behavior.delayed {
            self.recorder.record(format!("delayed:{}", self.name));
        }
        self.behavior.delayed
    }

    fn about_to_shutdown(&mut self) {
        self.recorder.record(format!("stop:{}", self.name));
    }
}

impl Drop for MockPlugin {
    fn drop(&mut self) {
        self.recorder.record(format!("drop:{}", self.name));
    }
}

/// Loader providing a [`MockPlugin`] for each name
pub fn mock_loader(recorder: &Recorder, plugins: &[&str]) -> StaticLibraryLoader {
    let with_behavior: Vec<(&str, Behavior)> =
        plugins.iter().map(|name| (*name, Behavior::default())).collect();
    mock_loader_with(recorder, &with_behavior)
}

pub fn mock_loader_with(recorder: &Recorder, plugins: &[(&str, Behavior)]) -> StaticLibraryLoader {
    let mut loader = StaticLibraryLoader::new();
    for (name, behavior) in plugins {
        let name = name.to_string();
        let recorder = recorder.clone();
        let behavior = behavior.clone();
        let plugin_name = name.clone();
        loader.register_plugin(&name, move || MockPlugin {
            name: plugin_name.clone(),
            recorder: recorder.clone(),
            behavior: behavior.clone(),
        });
    }
    loader
}

/// Resolves and loads everything in `registry`
pub fn resolve_and_load(registry: &mut PluginRegistry, loader: &dyn LibraryLoader) -> LoadReport {
    registry.resolve();
    let order = registry.load_order().clone();
    registry.controller(loader).load_plugins(&order)
}
