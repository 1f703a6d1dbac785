use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::plugin_system::PluginSystemError;
use crate::plugin_system::descriptor::PluginStatus;
use crate::plugin_system::error::ResolutionError;
use crate::plugin_system::lifecycle::LoadReport;
use crate::plugin_system::manager::PluginManager;
use crate::plugin_system::options;
use crate::storage::config::PluginSettings;

/// What happened while starting the application
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    /// Descriptors known after discovery, valid or not
    pub discovered: usize,
    pub resolution_errors: Vec<ResolutionError>,
    pub load: LoadReport,
    /// Command-line arguments no option consumed
    pub free_arguments: Vec<String>,
}

/// Owns the plugin manager and runs the startup routine:
/// command line → discovery → options → resolution → loading.
pub struct Application {
    manager: PluginManager,
    started: bool,
}

impl Application {
    /// Creates an application loading plugins from shared libraries
    pub fn new() -> Self {
        Self::with_manager(PluginManager::new())
    }

    /// Creates an application around a preconfigured manager
    pub fn with_manager(manager: PluginManager) -> Self {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);
        Self {
            manager,
            started: false,
        }
    }

    /// Applies persisted settings before startup
    pub fn with_settings(mut self, settings: PluginSettings) -> Self {
        self.manager.apply_settings(settings);
        self
    }

    /// Runs the startup routine with the plugin runtime's command line.
    ///
    /// Descriptors are discovered when any search path is configured;
    /// otherwise the descriptors already registered with the manager are
    /// used. Plugin failures do not fail startup: they are reported and the
    /// remaining plugins keep running. A malformed command line does.
    pub async fn start(&mut self, args: &[String]) -> Result<StartupReport> {
        if self.started {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Start,
                message: "Application already started".to_string(),
            });
        }

        let rest = self.discover_with(args).await?;
        let discovered = self.manager.registry().len();

        let parsed = self.manager.parse_options(&rest)?;
        let resolution_errors = self.manager.resolve();
        let load = self.manager.load_plugins();
        self.started = true;

        log::info!(
            "{} started with {} running plugin(s)",
            constants::APP_NAME,
            load.running.len()
        );
        Ok(StartupReport {
            discovered,
            resolution_errors,
            load,
            free_arguments: parsed.free_arguments,
        })
    }

    /// Discovers plugins without resolving or loading any of them, e.g. to
    /// list their options or versions. Only `-pluginpath` is taken from
    /// `args`. Returns the number of known descriptors.
    pub async fn discover(&mut self, args: &[String]) -> Result<usize> {
        self.discover_with(args).await?;
        Ok(self.manager.registry().len())
    }

    /// Takes out `-pluginpath` and discovers when any search path is set.
    /// Returns the arguments left for the options parser.
    async fn discover_with(&mut self, args: &[String]) -> Result<Vec<String>> {
        let (paths, rest) =
            options::extract_plugin_paths(args).map_err(PluginSystemError::from)?;
        for path in paths {
            self.manager.add_plugin_path(path);
        }

        if !self.manager.plugin_paths().is_empty() {
            self.manager.discover().await;
        }
        Ok(rest)
    }

    /// Stops and deletes every running plugin
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.started {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Shutdown,
                message: "Application was not started".to_string(),
            });
        }
        let report = self.manager.shutdown();
        log::info!("Deleted {} plugin(s)", report.deleted.len());
        self.started = false;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Diagnostic snapshot of every known plugin
    pub fn statuses(&self) -> Vec<PluginStatus> {
        self.manager.statuses()
    }

    pub fn plugin_manager(&self) -> &PluginManager {
        &self.manager
    }

    pub fn plugin_manager_mut(&mut self) -> &mut PluginManager {
        &mut self.manager
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}
