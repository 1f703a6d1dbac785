use std::any::Any;
use std::fmt::Write as _;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Weak;

use tokio::fs;

use crate::kernel::constants::DESCRIPTOR_FILE_NAME;
use crate::kernel::error::{Error as KernelError, Result as KernelResult};
use crate::plugin_system::descriptor::{PluginDescriptor, PluginState, PluginStatus};
use crate::plugin_system::error::{PluginSystemError, ResolutionError};
use crate::plugin_system::lifecycle::{LoadReport, ShutdownReport};
use crate::plugin_system::loader::{DynamicLibraryLoader, LibraryLoader};
use crate::plugin_system::options::{self, OptionsParser, ParsedOptions};
use crate::plugin_system::parser;
use crate::plugin_system::registry::PluginRegistry;
use crate::storage::config::PluginSettings;

/// Discovers, resolves, loads and shuts down plugins.
///
/// Typical use, driven by [`Application`](crate::kernel::Application):
/// `add_plugin_path` → `discover` → `parse_options` → `resolve` →
/// `load_plugins` → … → `shutdown`. Dropping the manager shuts down whatever
/// is still running.
pub struct PluginManager {
    registry: PluginRegistry,
    plugin_paths: Vec<PathBuf>,
    settings: PluginSettings,
    loader: Box<dyn LibraryLoader>,
    profile: bool,
    free_arguments: Vec<String>,
}

impl PluginManager {
    /// Create a manager loading plugins from shared libraries
    pub fn new() -> Self {
        Self::with_loader(Box::new(DynamicLibraryLoader::new()))
    }

    /// Create a manager with a custom library loader
    pub fn with_loader(loader: Box<dyn LibraryLoader>) -> Self {
        Self {
            registry: PluginRegistry::new(),
            plugin_paths: Vec::new(),
            settings: PluginSettings::default(),
            loader,
            profile: false,
            free_arguments: Vec::new(),
        }
    }

    /// Add a directory to search for descriptors
    pub fn add_plugin_path<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref().to_path_buf();
        if !self.plugin_paths.contains(&path) {
            self.plugin_paths.push(path);
        }
    }

    pub fn plugin_paths(&self) -> &[PathBuf] {
        &self.plugin_paths
    }

    /// Use `settings` for search paths and enablement overrides. Its search
    /// paths go before the ones added so far.
    pub fn apply_settings(&mut self, settings: PluginSettings) {
        let mut paths = settings.plugin_paths.clone();
        for path in self.plugin_paths.drain(..) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        self.plugin_paths = paths;
        self.settings = settings;
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// Rebuild the registry from every `plugin.xml` under the search paths.
    /// Returns the number of descriptors found, valid or not.
    ///
    /// A search path that cannot be read is logged and skipped, like any
    /// unreadable directory below it.
    pub async fn discover(&mut self) -> usize {
        self.shutdown();
        self.registry = PluginRegistry::new();

        let mut files = Vec::new();
        for dir in &self.plugin_paths {
            if let Err(e) = Self::scan_directory_boxed(dir.clone(), &mut files).await {
                log::warn!("Skipping plugin path {}: {}", dir.display(), e);
            }
        }

        for file in files {
            let descriptor = match parser::read_descriptor(&file).await {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    log::warn!("{}", err);
                    PluginDescriptor::invalid(&file, err.to_string())
                }
            };
            self.add_descriptor(descriptor);
        }

        log::info!("Discovered {} plugin descriptor(s)", self.registry.len());
        self.registry.len()
    }

    /// Helper function that returns a boxed future for recursive scanning
    fn scan_directory_boxed<'a>(
        dir: PathBuf,
        files: &'a mut Vec<PathBuf>,
    ) -> Pin<Box<dyn Future<Output = KernelResult<()>> + Send + 'a>> {
        Box::pin(Self::scan_directory_inner(dir, files))
    }

    /// Collects descriptor files below `dir`, visiting entries in name order
    async fn scan_directory_inner(dir: PathBuf, files: &mut Vec<PathBuf>) -> KernelResult<()> {
        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|source| PluginSystemError::Discovery {
                path: dir.clone(),
                source,
            })?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| KernelError::io(e, "read_dir", dir.clone()))?
        {
            entries.push(entry.path());
        }
        entries.sort();

        for path in entries {
            let metadata = match fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) => {
                    log::warn!("Failed to get metadata for {}: {}", path.display(), e);
                    continue;
                }
            };
            if metadata.is_dir() {
                if let Err(e) = Self::scan_directory_boxed(path.clone(), files).await {
                    log::warn!("Error scanning subdirectory {}: {}", path.display(), e);
                }
            } else if path.file_name().is_some_and(|name| name == DESCRIPTOR_FILE_NAME) {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Register a descriptor and return its index. Its effective enablement
    /// is recomputed from its default and the settings.
    pub fn add_descriptor(&mut self, mut descriptor: PluginDescriptor) -> usize {
        if !descriptor.has_error() {
            let enabled = self
                .settings
                .enablement_override(&descriptor.name)
                .unwrap_or(!descriptor.is_disabled_by_default());
            descriptor.set_enabled(enabled);
        }
        self.registry.add(descriptor)
    }

    /// Parse the runtime command line against the discovered plugins and
    /// apply it. Nothing is applied if the command line is malformed.
    pub fn parse_options(&mut self, args: &[String]) -> KernelResult<ParsedOptions> {
        let parsed = OptionsParser::new(args, &self.registry)
            .parse()
            .map_err(PluginSystemError::from)?;
        parsed.apply(&mut self.registry);
        self.profile |= parsed.profile;
        self.free_arguments = parsed.free_arguments.clone();
        for path in &parsed.plugin_paths {
            self.add_plugin_path(path);
        }
        Ok(parsed)
    }

    /// Resolve dependencies of all discovered plugins
    pub fn resolve(&mut self) -> Vec<ResolutionError> {
        self.registry.resolve()
    }

    /// Load, initialize and start every resolved plugin
    pub fn load_plugins(&mut self) -> LoadReport {
        let order = self.registry.load_order().clone();
        self.registry
            .controller(self.loader.as_ref())
            .with_profiling(self.profile)
            .load_plugins(&order)
    }

    /// Stop and delete every running plugin. Safe to call more than once.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let order = self.registry.load_order().clone();
        self.registry
            .controller(self.loader.as_ref())
            .with_profiling(self.profile)
            .shutdown(&order)
    }

    pub fn set_profiling(&mut self, profile: bool) {
        self.profile = profile;
    }

    pub fn is_profiling(&self) -> bool {
        self.profile
    }

    /// Command-line arguments not consumed as options
    pub fn free_arguments(&self) -> &[String] {
        &self.free_arguments
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    pub fn find(&self, name: &str) -> Option<&PluginDescriptor> {
        self.registry.find_descriptor(name)
    }

    pub fn statuses(&self) -> Vec<PluginStatus> {
        self.registry.statuses()
    }

    /// Help text for the options plugins declare, one block per plugin in
    /// discovery order. Plugins without options are left out.
    pub fn format_plugin_options(&self, option_indent: usize, description_indent: usize) -> String {
        let mut out = String::new();
        let declaring = self
            .registry
            .iter()
            .filter(|d| d.state() != PluginState::Invalid && !d.arguments.is_empty());
        for descriptor in declaring {
            let _ = writeln!(out, "\nPlugin: {}", descriptor.name);
            for argument in &descriptor.arguments {
                options::format_option(
                    &mut out,
                    &argument.name,
                    argument.parameter.as_deref(),
                    &argument.description,
                    option_indent,
                    description_indent,
                );
            }
        }
        out
    }

    /// One line per valid plugin: name, version and description
    pub fn format_plugin_versions(&self) -> String {
        let mut out = String::new();
        for descriptor in self.registry.iter().filter(|d| d.state() != PluginState::Invalid) {
            let line = format!(
                "  {} {} {}",
                descriptor.name,
                descriptor.version,
                descriptor.description.as_deref().unwrap_or_default().trim()
            );
            let _ = writeln!(out, "{}", line.trim_end());
        }
        out
    }

    /// Weak reference to an object published by a running plugin
    pub fn get_object<T: Any + Send + Sync>(&self, name: &str) -> Option<Weak<T>> {
        self.registry.get_object::<T>(name)
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugin_paths", &self.plugin_paths)
            .field("registry", &self.registry)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}
