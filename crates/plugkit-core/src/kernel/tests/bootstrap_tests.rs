// crates/plugkit-core/src/kernel/tests/bootstrap_tests.rs
#![cfg(test)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tempfile::tempdir;

use crate::kernel::bootstrap::Application;
use crate::kernel::error::{Error, KernelLifecyclePhase};
use crate::plugin_system::descriptor::{PluginDescriptor, PluginState};
use crate::plugin_system::error::OptionsError;
use crate::plugin_system::loader::StaticLibraryLoader;
use crate::plugin_system::manager::PluginManager;
use crate::plugin_system::traits::{Plugin, PluginContext, PluginError};
use crate::plugin_system::version::PluginVersion;
use crate::storage::config::PluginSettings;

type Log = Arc<Mutex<Vec<String>>>;

struct Greeter {
    log: Log,
}

impl Plugin for Greeter {
    fn initialize(
        &mut self,
        arguments: &[String],
        ctx: &mut PluginContext<'_>,
    ) -> Result<(), PluginError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("initialize {}", arguments.join(" ")));
        ctx.add_object("greeting", "hello".to_string());
        Ok(())
    }

    fn extensions_initialized(&mut self, _ctx: &mut PluginContext<'_>) {}

    fn about_to_shutdown(&mut self) {
        self.log.lock().unwrap().push("shutdown".to_string());
    }
}

fn greeter_manager(log: &Log) -> PluginManager {
    let mut loader = StaticLibraryLoader::new();
    let log = Arc::clone(log);
    loader.register_plugin("Greeter", move || Greeter {
        log: Arc::clone(&log),
    });
    PluginManager::with_loader(Box::new(loader))
}

fn write_greeter(root: &Path) {
    let dir = root.join("greeter");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("plugin.xml"),
        r#"<plugin name="Greeter" version="1.0">
  <argumentList>
    <argument name="-name" parameter="who">Who to greet</argument>
  </argumentList>
</plugin>"#,
    )
    .unwrap();
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_start_discovers_and_runs_plugins() {
    let root = tempdir().unwrap();
    write_greeter(root.path());
    let log = Log::default();
    let mut app = Application::with_manager(greeter_manager(&log));
    let plugin_path = root.path().to_string_lossy().into_owned();

    let report = app
        .start(&args(&["-pluginpath", &plugin_path, "-name", "world", "input.txt"]))
        .await
        .unwrap();

    assert!(app.is_started());
    assert_eq!(report.discovered, 1);
    assert!(report.resolution_errors.is_empty());
    assert_eq!(report.load.running, vec![0]);
    assert_eq!(report.free_arguments, args(&["input.txt"]));
    assert_eq!(*log.lock().unwrap(), vec!["initialize -name world".to_string()]);
    assert!(app.plugin_manager().get_object::<String>("greeting").is_some());

    let statuses = app.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].name, "Greeter");

    app.shutdown().unwrap();
    assert!(!app.is_started());
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("shutdown"));
    assert_eq!(
        app.plugin_manager().find("Greeter").unwrap().state(),
        PluginState::Deleted
    );
}

#[tokio::test]
async fn test_settings_provide_search_paths() {
    let root = tempdir().unwrap();
    write_greeter(root.path());
    let log = Log::default();
    let settings = PluginSettings {
        plugin_paths: vec![root.path().to_path_buf()],
        ..PluginSettings::default()
    };
    let mut app = Application::with_manager(greeter_manager(&log)).with_settings(settings);

    let report = app.start(&[]).await.unwrap();

    assert_eq!(report.load.running, vec![0]);
}

#[tokio::test]
async fn test_start_without_search_paths_uses_registered_descriptors() {
    let log = Log::default();
    let mut manager = greeter_manager(&log);
    manager.add_descriptor(PluginDescriptor::new("Greeter", PluginVersion::new(1, 0, 0)));
    let mut app = Application::with_manager(manager);

    let report = app.start(&[]).await.unwrap();

    assert_eq!(report.discovered, 1);
    assert_eq!(report.load.running, vec![0]);
}

#[tokio::test]
async fn test_start_twice_fails() {
    let mut app = Application::with_manager(greeter_manager(&Log::default()));
    app.start(&[]).await.unwrap();

    let err = app.start(&[]).await.unwrap_err();

    assert!(matches!(
        err,
        Error::KernelLifecycleError {
            phase: KernelLifecyclePhase::Start,
            ..
        }
    ));
}

#[test]
fn test_shutdown_before_start_fails() {
    let mut app = Application::with_manager(greeter_manager(&Log::default()));

    let err = app.shutdown().unwrap_err();

    assert_eq!(
        err.to_string(),
        "Kernel lifecycle error during Shutdown: Application was not started"
    );
}

#[tokio::test]
async fn test_malformed_command_line_aborts_start() {
    let mut app = Application::with_manager(greeter_manager(&Log::default()));

    let err = app.start(&args(&["-pluginpath"])).await.unwrap_err();
    assert_eq!(
        err.as_options_error(),
        Some(&OptionsError::RequiresArgument("-pluginpath".to_string()))
    );

    let err = app.start(&args(&["-unknown"])).await.unwrap_err();
    assert_eq!(
        err.as_options_error(),
        Some(&OptionsError::UnknownOption("-unknown".to_string()))
    );
    assert!(!app.is_started());
}

#[tokio::test]
async fn test_discover_lists_plugins_without_loading_them() {
    let root = tempdir().unwrap();
    write_greeter(root.path());
    let log = Log::default();
    let mut app = Application::with_manager(greeter_manager(&log));
    let plugin_path = root.path().to_string_lossy().into_owned();

    let found = app
        .discover(&args(&["-pluginpath", &plugin_path, "-name", "Ada"]))
        .await
        .unwrap();

    assert_eq!(found, 1);
    assert!(!app.is_started());
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(app.statuses()[0].state, PluginState::Read);
    assert_eq!(
        app.plugin_manager().format_plugin_options(4, 24),
        format!("\nPlugin: Greeter\n    -name <who>{}Who to greet\n", " ".repeat(9))
    );
    assert_eq!(app.plugin_manager().format_plugin_versions(), "  Greeter 1.0\n");
}
