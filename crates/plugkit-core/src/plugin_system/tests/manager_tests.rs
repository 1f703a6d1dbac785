// crates/plugkit-core/src/plugin_system/tests/manager_tests.rs
#![cfg(test)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use super::common::{mock_loader, mock_loader_with, v, Behavior, Recorder};
use crate::plugin_system::descriptor::{PluginDescriptor, PluginState};
use crate::plugin_system::error::OptionsError;
use crate::plugin_system::manager::PluginManager;
use crate::storage::config::PluginSettings;

fn write_plugin(root: &Path, dir: &str, xml: &str) -> PathBuf {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join("plugin.xml");
    fs::write(&file, xml).unwrap();
    file
}

fn plugin_xml(name: &str, dependencies: &[&str]) -> String {
    let mut xml = format!(r#"<plugin name="{name}" version="1.0">"#);
    if !dependencies.is_empty() {
        xml.push_str("<dependencyList>");
        for dependency in dependencies {
            xml.push_str(&format!(r#"<dependency name="{dependency}" version="1.0"/>"#));
        }
        xml.push_str("</dependencyList>");
    }
    xml.push_str("</plugin>");
    xml
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn discovered_names(manager: &PluginManager) -> Vec<String> {
    manager.registry().iter().map(|d| d.name.clone()).collect()
}

#[tokio::test]
async fn test_discover_walks_directories_in_name_order() {
    let root = tempdir().unwrap();
    write_plugin(root.path(), "b_second", &plugin_xml("Second", &[]));
    write_plugin(root.path(), "a_first", &plugin_xml("First", &[]));
    write_plugin(root.path(), "c_group/inner", &plugin_xml("Nested", &[]));
    fs::write(root.path().join("README.txt"), "not a descriptor").unwrap();

    let mut manager = PluginManager::new();
    manager.add_plugin_path(root.path());
    let found = manager.discover().await;

    assert_eq!(found, 3);
    assert_eq!(discovered_names(&manager), vec!["First", "Second", "Nested"]);
    let first = manager.find("First").unwrap();
    assert_eq!(first.state(), PluginState::Read);
    assert_eq!(
        first.descriptor_path(),
        Some(root.path().join("a_first").join("plugin.xml").as_path())
    );
    assert_eq!(first.location().parent(), Some(root.path().join("a_first").as_path()));
}

#[tokio::test]
async fn test_unreadable_descriptor_is_kept_as_invalid() {
    let root = tempdir().unwrap();
    write_plugin(root.path(), "broken", "<plugin name=\"Broken\"");
    write_plugin(root.path(), "fine", &plugin_xml("Fine", &[]));

    let mut manager = PluginManager::new();
    manager.add_plugin_path(root.path());
    manager.discover().await;

    let broken = manager.find("broken").unwrap();
    assert_eq!(broken.state(), PluginState::Invalid);
    assert!(broken
        .error_message()
        .unwrap()
        .starts_with("Error parsing file"));
    assert!(!broken.is_enabled());
    assert_eq!(manager.find("Fine").unwrap().state(), PluginState::Read);
}

#[tokio::test]
async fn test_missing_search_path_is_skipped() {
    let root = tempdir().unwrap();
    write_plugin(root.path(), "one", &plugin_xml("One", &[]));

    let mut manager = PluginManager::new();
    manager.add_plugin_path(root.path().join("does-not-exist"));
    manager.add_plugin_path(root.path());

    assert_eq!(manager.discover().await, 1);
}

#[tokio::test]
async fn test_unreadable_search_path_is_skipped() {
    let root = tempdir().unwrap();
    write_plugin(root.path(), "one", &plugin_xml("One", &[]));
    let not_a_directory = root.path().join("plain-file");
    std::fs::write(&not_a_directory, "not a directory").unwrap();

    let mut manager = PluginManager::new();
    manager.add_plugin_path(&not_a_directory);
    manager.add_plugin_path(root.path());

    assert_eq!(manager.discover().await, 1);
    assert_eq!(manager.find("One").unwrap().state(), PluginState::Read);
}

#[tokio::test]
async fn test_duplicate_plugin_is_invalid() {
    let root = tempdir().unwrap();
    let first = write_plugin(root.path(), "one", &plugin_xml("A", &[]));
    write_plugin(root.path(), "two", &plugin_xml("A", &[]));

    let mut manager = PluginManager::new();
    manager.add_plugin_path(root.path());
    manager.discover().await;

    let registry = manager.registry();
    assert_eq!(registry.get(0).unwrap().state(), PluginState::Read);
    assert_eq!(registry.get(1).unwrap().state(), PluginState::Invalid);
    assert_eq!(
        registry.get(1).unwrap().error_message().unwrap(),
        format!("Plugin 'A(1.0)' was already found in {}", first.display())
    );
}

#[test]
fn test_plugin_paths_are_deduplicated_and_settings_come_first() {
    let mut manager = PluginManager::new();
    manager.add_plugin_path("/cli");
    manager.add_plugin_path("/cli");
    manager.apply_settings(PluginSettings {
        plugin_paths: vec![PathBuf::from("/settings"), PathBuf::from("/cli")],
        ..PluginSettings::default()
    });

    assert_eq!(
        manager.plugin_paths(),
        &[PathBuf::from("/settings"), PathBuf::from("/cli")]
    );
}

#[tokio::test]
async fn test_settings_override_descriptor_defaults() {
    let root = tempdir().unwrap();
    write_plugin(root.path(), "a", &plugin_xml("A", &[]));
    write_plugin(
        root.path(),
        "lab",
        r#"<plugin name="Lab" version="0.1" experimental="true"/>"#,
    );
    write_plugin(root.path(), "z", &plugin_xml("Z", &[]));

    let mut manager = PluginManager::new();
    manager.apply_settings(PluginSettings {
        plugin_paths: vec![root.path().to_path_buf()],
        disabled_plugins: vec!["A".to_string()],
        force_enabled_plugins: vec!["Lab".to_string()],
    });
    manager.discover().await;

    assert!(!manager.find("A").unwrap().is_enabled());
    assert!(manager.find("Lab").unwrap().is_enabled());
    assert!(manager.find("Z").unwrap().is_enabled());
}

#[tokio::test]
async fn test_full_pipeline_with_compiled_in_plugins() {
    let root = tempdir().unwrap();
    write_plugin(root.path(), "a", &plugin_xml("A", &[]));
    write_plugin(root.path(), "b", &plugin_xml("B", &["A"]));
    write_plugin(root.path(), "c", &plugin_xml("C", &["B"]));

    let recorder = Recorder::default();
    let publishing = Behavior {
        publish: true,
        ..Behavior::default()
    };
    let loader = mock_loader_with(
        &recorder,
        &[("A", publishing), ("B", Behavior::default()), ("C", Behavior::default())],
    );
    let mut manager = PluginManager::with_loader(Box::new(loader));
    manager.add_plugin_path(root.path());
    manager.discover().await;

    let parsed = manager
        .parse_options(&args(&["-noload", "C", "-profile", "notes.txt"]))
        .unwrap();
    assert_eq!(parsed.free_arguments, args(&["notes.txt"]));
    assert_eq!(manager.free_arguments(), &args(&["notes.txt"])[..]);
    assert!(manager.is_profiling());

    assert!(manager.resolve().is_empty());
    let report = manager.load_plugins();

    assert_eq!(report.running, vec![0, 1]);
    assert_eq!(report.skipped, vec![2]);
    let object = manager.get_object::<String>("A.object").unwrap();
    assert!(object.upgrade().is_some());

    let shutdown = manager.shutdown();
    assert_eq!(shutdown.deleted, vec![1, 0]);
    assert!(object.upgrade().is_none());
    assert_eq!(
        recorder.events(),
        vec!["init:A", "init:B", "cross:B", "cross:A", "stop:B", "stop:A", "drop:B", "drop:A"]
    );
}

#[tokio::test]
async fn test_malformed_command_line_changes_nothing() {
    let root = tempdir().unwrap();
    write_plugin(root.path(), "a", &plugin_xml("A", &[]));
    let mut manager = PluginManager::new();
    manager.add_plugin_path(root.path());
    manager.discover().await;

    let err = manager
        .parse_options(&args(&["-noload", "A", "-bogus"]))
        .unwrap_err();

    assert_eq!(
        err.as_options_error(),
        Some(&OptionsError::UnknownOption("-bogus".to_string()))
    );
    assert!(manager.find("A").unwrap().is_enabled());
}

#[tokio::test]
async fn test_late_plugin_path_is_used_by_the_next_discovery() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    write_plugin(first.path(), "a", &plugin_xml("A", &[]));
    write_plugin(second.path(), "b", &plugin_xml("B", &[]));

    let mut manager = PluginManager::new();
    manager.add_plugin_path(first.path());
    manager.discover().await;
    let late = second.path().to_string_lossy().into_owned();
    manager
        .parse_options(&args(&["-pluginpath", late.as_str()]))
        .unwrap();
    assert_eq!(discovered_names(&manager), vec!["A"]);

    manager.discover().await;
    assert_eq!(discovered_names(&manager), vec!["A", "B"]);
}

#[tokio::test]
async fn test_rediscovery_shuts_down_running_plugins() {
    let root = tempdir().unwrap();
    write_plugin(root.path(), "a", &plugin_xml("A", &[]));
    let recorder = Recorder::default();
    let mut manager = PluginManager::with_loader(Box::new(mock_loader(&recorder, &["A"])));
    manager.add_plugin_path(root.path());
    manager.discover().await;
    manager.resolve();
    manager.load_plugins();

    manager.discover().await;

    assert_eq!(recorder.events_with("stop:"), vec!["stop:A"]);
    assert_eq!(recorder.events_with("drop:"), vec!["drop:A"]);
    assert_eq!(manager.find("A").unwrap().state(), PluginState::Read);
}

#[test]
fn test_dropping_the_manager_shuts_plugins_down() {
    let recorder = Recorder::default();
    let mut manager = PluginManager::with_loader(Box::new(mock_loader(&recorder, &["A"])));
    manager.add_descriptor(super::common::descriptor("A", "1.0", &[]));
    manager.resolve();
    assert_eq!(manager.load_plugins().running, vec![0]);

    drop(manager);

    assert_eq!(recorder.events(), vec!["init:A", "cross:A", "stop:A", "drop:A"]);
}

#[test]
fn test_added_descriptor_follows_settings() {
    let mut manager = PluginManager::new();
    manager.apply_settings(PluginSettings {
        disabled_plugins: vec!["A".to_string()],
        ..PluginSettings::default()
    });

    let index = manager.add_descriptor(super::common::descriptor("A", "1.0", &[]));

    assert!(!manager.registry().get(index).unwrap().is_enabled());
}

#[test]
fn test_plugin_option_help_and_version_listing() {
    let mut manager = PluginManager::new();
    manager.add_descriptor(
        PluginDescriptor::builder("Editor", v("1.2"))
            .description("  Edits text ")
            .argument("-level", Some("n"), "Indentation level")
            .argument("-plain", None, "No colours")
            .build(),
    );
    manager.add_descriptor(PluginDescriptor::builder("Quiet", v("2.0")).build());
    manager.add_descriptor(PluginDescriptor::invalid(Path::new("broken/plugin.xml"), "bad"));

    assert_eq!(
        manager.format_plugin_options(2, 16),
        "\nPlugin: Editor\n  -level <n>    Indentation level\n  -plain        No colours\n"
    );
    assert_eq!(manager.format_plugin_versions(), "  Editor 1.2 Edits text\n  Quiet 2.0\n");
}
