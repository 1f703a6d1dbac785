//! # Plugin Lifecycle Controller
//!
//! Drives resolved plugins through their states:
//!
//! ```text
//! Resolved -> Loaded -> Initialized -> Running -> Stopped -> Deleted
//! ```
//!
//! Each transition is a public method that checks its precondition first. A
//! violated precondition is returned as a [`LifecycleError`] and leaves the
//! descriptor untouched. Any other failure is recorded on the descriptor,
//! which becomes `Invalid` and releases its instance.
//!
//! [`LifecycleController::load_plugins`] runs the whole startup sequence:
//! every plugin is loaded and initialized in load order, then cross-initialized
//! and given a delayed-initialize call in reverse load order.
//! [`LifecycleController::shutdown`] stops and then deletes every running
//! plugin, dependents first.
// crates/plugkit-core/src/plugin_system/lifecycle.rs
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::plugin_system::dependency::DependencyGraph;
use crate::plugin_system::descriptor::{DependencyKind, PluginDescriptor, PluginState};
use crate::plugin_system::error::LifecycleError;
use crate::plugin_system::loader::{self, LibraryLoader};
use crate::plugin_system::object_pool::ObjectPool;
use crate::plugin_system::resolver::LoadOrder;
use crate::plugin_system::traits::PluginContext;

/// Outcome of [`LifecycleController::load_plugins`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Plugins that reached `Running` during this call, in load order
    pub running: Vec<usize>,
    /// Disabled plugins that were not loaded
    pub skipped: Vec<usize>,
    /// Plugins whose delayed initialization did work
    pub delayed: Vec<usize>,
    /// Every recorded failure, in the order it happened
    pub failures: Vec<LifecycleError>,
}

/// Outcome of [`LifecycleController::shutdown`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stopped: Vec<usize>,
    pub deleted: Vec<usize>,
}

/// Performs lifecycle transitions on a borrowed set of descriptors.
///
/// Transitions run strictly one after another on the calling thread.
pub struct LifecycleController<'a> {
    descriptors: &'a mut [PluginDescriptor],
    objects: &'a mut ObjectPool,
    graph: &'a DependencyGraph,
    loader: &'a dyn LibraryLoader,
    profile: bool,
}

impl<'a> LifecycleController<'a> {
    pub fn new(
        descriptors: &'a mut [PluginDescriptor],
        objects: &'a mut ObjectPool,
        graph: &'a DependencyGraph,
        loader: &'a dyn LibraryLoader,
    ) -> Self {
        Self {
            descriptors,
            objects,
            graph,
            loader,
            profile: false,
        }
    }

    /// Log the duration of every transition at info level
    pub fn with_profiling(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    fn descriptor(&self, index: usize) -> Result<&PluginDescriptor, LifecycleError> {
        self.descriptors
            .get(index)
            .ok_or(LifecycleError::UnknownPlugin(index))
    }

    /// Records `error` on the plugin and releases everything it owns
    fn fail(&mut self, index: usize, error: LifecycleError) -> LifecycleError {
        self.objects.remove_owned_by(index);
        self.descriptors[index].fail(error.to_string());
        error
    }

    fn profiled<T>(&mut self, index: usize, transition: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        if !self.profile {
            return f(self);
        }
        let started = Instant::now();
        let result = f(self);
        log::info!(
            "Profiling: {} {} took {} ms",
            self.descriptors[index].name,
            transition,
            started.elapsed().as_millis()
        );
        result
    }

    /// `Resolved -> Loaded`: opens the library and instantiates the plugin.
    ///
    /// Every required dependency must already hold an instance; otherwise
    /// the plugin fails with the dependency's own failure as the reason.
    pub fn load(&mut self, index: usize) -> Result<(), LifecycleError> {
        let descriptor = self.descriptor(index)?;
        let plugin = descriptor.name.clone();
        if descriptor.state() != PluginState::Resolved {
            return Err(LifecycleError::NotResolved { plugin });
        }
        if !descriptor.is_enabled() {
            return Err(LifecycleError::Disabled { plugin });
        }

        let graph = self.graph;
        for edge in graph.edges(index) {
            if edge.kind != DependencyKind::Required {
                continue;
            }
            let provider = &self.descriptors[edge.provider];
            if provider.state().holds_instance() {
                continue;
            }
            let reason = match provider.error_message() {
                Some(message) => message.to_string(),
                None if !provider.is_enabled() => {
                    LifecycleError::Disabled {
                        plugin: provider.name.clone(),
                    }
                    .to_string()
                }
                None => provider.state().description().to_string(),
            };
            let error = LifecycleError::DependencyFailed {
                plugin,
                dependency: provider.display_name(),
                reason,
            };
            return Err(self.fail(index, error));
        }

        let library = match self.loader.open(&self.descriptors[index]) {
            Ok(library) => library,
            Err(message) => {
                return Err(self.fail(index, LifecycleError::LibraryLoad { plugin, message }));
            }
        };
        match loader::instantiate(library, &plugin) {
            Ok(handle) => {
                self.descriptors[index].attach(handle);
                Ok(())
            }
            Err(error) => Err(self.fail(index, error)),
        }
    }

    /// `Loaded -> Initialized`: hands the plugin its command-line arguments
    pub fn initialize(&mut self, index: usize) -> Result<(), LifecycleError> {
        let descriptor = self.descriptor(index)?;
        let plugin = descriptor.name.clone();
        if descriptor.state() != PluginState::Loaded {
            return Err(LifecycleError::InitializeWrongState { plugin });
        }
        if descriptor.handle().and_then(|h| h.plugin()).is_none() {
            return Err(LifecycleError::MissingInstanceForInitialize { plugin });
        }
        let arguments = descriptor.arguments_passed().to_vec();

        let objects = &mut *self.objects;
        let instance = self.descriptors[index]
            .handle_mut()
            .and_then(|handle| handle.plugin_mut())
            .ok_or_else(|| LifecycleError::MissingInstanceForInitialize {
                plugin: plugin.clone(),
            })?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = PluginContext::new(index, &plugin, objects);
            instance.initialize(&arguments, &mut ctx)
        }));

        match outcome {
            Ok(Ok(())) => {
                self.descriptors[index].set_state(PluginState::Initialized);
                Ok(())
            }
            Ok(Err(error)) => {
                let error = LifecycleError::InitializationFailed {
                    plugin,
                    message: error.to_string(),
                };
                Err(self.fail(index, error))
            }
            Err(payload) => {
                let error = LifecycleError::InitializationFailed {
                    plugin,
                    message: loader::panic_message(payload.as_ref()),
                };
                Err(self.fail(index, error))
            }
        }
    }

    /// `Initialized -> Running`: the second initialization pass, run once
    /// every plugin was initialized
    pub fn cross_initialize(&mut self, index: usize) -> Result<(), LifecycleError> {
        let descriptor = self.descriptor(index)?;
        let plugin = descriptor.name.clone();
        if descriptor.state() != PluginState::Initialized {
            return Err(LifecycleError::CrossInitializeWrongState { plugin });
        }

        let objects = &mut *self.objects;
        let instance = self.descriptors[index]
            .handle_mut()
            .and_then(|handle| handle.plugin_mut())
            .ok_or_else(|| LifecycleError::MissingInstanceForCrossInitialize {
                plugin: plugin.clone(),
            })?;
        let mut ctx = PluginContext::new(index, &plugin, objects);
        instance.extensions_initialized(&mut ctx);

        self.descriptors[index].set_state(PluginState::Running);
        Ok(())
    }

    /// Gives a running plugin the chance to do deferred work. Returns
    /// whether it did any.
    pub fn delayed_initialize(&mut self, index: usize) -> Result<bool, LifecycleError> {
        let descriptor = self.descriptor(index)?;
        let plugin = descriptor.name.clone();
        if descriptor.state() != PluginState::Running {
            return Err(LifecycleError::DelayedInitializeWrongState { plugin });
        }

        let objects = &mut *self.objects;
        match self.descriptors[index]
            .handle_mut()
            .and_then(|handle| handle.plugin_mut())
        {
            Some(instance) => {
                let mut ctx = PluginContext::new(index, &plugin, objects);
                Ok(instance.delayed_initialize(&mut ctx))
            }
            None => Ok(false),
        }
    }

    /// `Running -> Stopped`
    pub fn stop(&mut self, index: usize) -> Result<(), LifecycleError> {
        let descriptor = self.descriptor(index)?;
        if descriptor.state() != PluginState::Running {
            return Err(LifecycleError::StopWrongState {
                plugin: descriptor.name.clone(),
            });
        }

        let descriptor = &mut self.descriptors[index];
        if let Some(instance) = descriptor.handle_mut().and_then(|h| h.plugin_mut()) {
            instance.about_to_shutdown();
        }
        descriptor.set_state(PluginState::Stopped);
        Ok(())
    }

    /// `Stopped -> Deleted`: drops the instance, then unloads its library
    pub fn delete(&mut self, index: usize) -> Result<(), LifecycleError> {
        let descriptor = self.descriptor(index)?;
        if descriptor.state() != PluginState::Stopped {
            return Err(LifecycleError::DeleteWrongState {
                plugin: descriptor.name.clone(),
            });
        }

        let descriptor = &mut self.descriptors[index];
        let removed = self.objects.remove_owned_by(index);
        if removed > 0 {
            log::debug!(
                "Removed {} object(s) published by '{}'",
                removed,
                descriptor.name
            );
        }
        descriptor.release();
        Ok(())
    }

    /// Collects a failure from one of our own transition calls. The driver
    /// only attempts transitions whose preconditions it checked, so a
    /// precondition violation here means the driver itself is broken.
    fn record(result: Result<(), LifecycleError>, failures: &mut Vec<LifecycleError>) -> bool {
        match result {
            Ok(()) => true,
            Err(error) => {
                debug_assert!(
                    !error.is_precondition_violation(),
                    "lifecycle driver attempted an invalid transition: {error}"
                );
                failures.push(error);
                false
            }
        }
    }

    /// Loads, initializes and starts every plugin in `order` that is still
    /// `Resolved`. Plugins already past `Resolved` are left as they are.
    ///
    /// Failures are recorded per plugin and never stop the sequence.
    pub fn load_plugins(&mut self, order: &LoadOrder) -> LoadReport {
        let mut report = LoadReport::default();

        for index in order.iter() {
            let Some(descriptor) = self.descriptors.get(index) else {
                continue;
            };
            if descriptor.state() != PluginState::Resolved {
                continue;
            }
            if !descriptor.is_enabled() {
                log::info!("Plugin '{}' is disabled, not loading it", descriptor.name);
                report.skipped.push(index);
                continue;
            }

            let loaded = self.profiled(index, "load", |c| c.load(index));
            if Self::record(loaded, &mut report.failures) {
                let initialized = self.profiled(index, "initialize", |c| c.initialize(index));
                Self::record(initialized, &mut report.failures);
            }
        }

        // plugins started by this call, in reverse load order
        let mut started = Vec::new();
        for index in order.iter().rev() {
            if self.descriptors[index].state() != PluginState::Initialized {
                continue;
            }
            let result = self.profiled(index, "extensionsInitialized", |c| c.cross_initialize(index));
            if Self::record(result, &mut report.failures) {
                started.push(index);
            }
        }

        for &index in &started {
            if self.descriptors[index].state() != PluginState::Running {
                continue;
            }
            match self.profiled(index, "delayedInitialize", |c| c.delayed_initialize(index)) {
                Ok(true) => report.delayed.push(index),
                Ok(false) => {}
                Err(error) => {
                    Self::record(Err(error), &mut report.failures);
                }
            }
        }
        if !report.delayed.is_empty() {
            let names: Vec<&str> = report
                .delayed
                .iter()
                .map(|&idx| self.descriptors[idx].name.as_str())
                .collect();
            log::debug!("Delayed initialization done by: {}", names.join(", "));
        }

        report.running = order
            .iter()
            .filter(|&idx| started.contains(&idx))
            .filter(|&idx| self.descriptors[idx].state() == PluginState::Running)
            .collect();
        log::info!(
            "{} plugin(s) running, {} failed, {} disabled",
            report.running.len(),
            report.failures.len(),
            report.skipped.len()
        );
        report
    }

    /// Reverse load order, followed by every plugin missing from `order`,
    /// latest discovered first
    fn shutdown_sequence(&self, order: &LoadOrder) -> Vec<usize> {
        let count = self.descriptors.len();
        let mut sequence: Vec<usize> = order.iter().rev().filter(|&idx| idx < count).collect();
        sequence.extend((0..count).rev().filter(|&idx| !order.contains(idx)));
        sequence
    }

    /// Stops every running plugin, then deletes every stopped one, both in
    /// reverse load order. Plugins missing from `order` are shut down after
    /// the others. Calling it again does nothing.
    pub fn shutdown(&mut self, order: &LoadOrder) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let mut failures = Vec::new();
        let sequence = self.shutdown_sequence(order);

        for &index in &sequence {
            if self.descriptors[index].state() != PluginState::Running {
                continue;
            }
            if Self::record(self.stop(index), &mut failures) {
                report.stopped.push(index);
            }
        }

        for &index in &sequence {
            if self.descriptors[index].state() != PluginState::Stopped {
                continue;
            }
            if Self::record(self.delete(index), &mut failures) {
                report.deleted.push(index);
            }
        }

        if !report.deleted.is_empty() {
            log::info!("Shut down {} plugin(s)", report.deleted.len());
        }
        report
    }
}
