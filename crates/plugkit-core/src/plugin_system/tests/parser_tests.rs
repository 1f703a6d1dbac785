// crates/plugkit-core/src/plugin_system/tests/parser_tests.rs
#![cfg(test)]

use std::path::Path;

use tempfile::tempdir;

use super::common::v;
use crate::plugin_system::descriptor::{DependencyKind, PluginDependency, PluginDescriptor, PluginState};
use crate::plugin_system::error::{DescriptorError, ParseErrorKind};
use crate::plugin_system::parser::{parse_descriptor, read_descriptor};

const FULL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plugin name="Core" version="1.2.0" compatVersion="1.0.0" experimental="true">
  <vendor>Example Org</vendor>
  <copyright>(C) Example Org</copyright>
  <license>MIT</license>
  <description>Core services</description>
  <url>https://example.org</url>
  <category>Core</category>
  <dependencyList>
    <dependency name="Base" version="1.0"/>
    <dependency name="Extras" version="2.1" type="optional"/>
  </dependencyList>
  <argumentList>
    <argument name="-theme" parameter="name">Select theme</argument>
    <argument name="-safe"/>
  </argumentList>
</plugin>
"#;

fn parse(text: &str) -> Result<PluginDescriptor, DescriptorError> {
    parse_descriptor(text, Path::new("plugin.xml"))
}

fn parse_err(text: &str) -> (ParseErrorKind, (u32, u32)) {
    let err = parse(text).unwrap_err();
    (err.kind().cloned().unwrap(), err.position().unwrap())
}

#[test]
fn test_parse_full_descriptor() {
    let d = parse(FULL).unwrap();
    assert_eq!(d.name, "Core");
    assert_eq!(d.version, v("1.2.0"));
    assert_eq!(d.compat_version, v("1.0.0"));
    assert!(d.experimental);
    assert!(!d.disabled_by_default);
    assert!(!d.is_enabled(), "experimental plugins start disabled");
    assert_eq!(d.vendor.as_deref(), Some("Example Org"));
    assert_eq!(d.copyright.as_deref(), Some("(C) Example Org"));
    assert_eq!(d.license.as_deref(), Some("MIT"));
    assert_eq!(d.description.as_deref(), Some("Core services"));
    assert_eq!(d.url.as_deref(), Some("https://example.org"));
    assert_eq!(d.category.as_deref(), Some("Core"));
    assert_eq!(
        d.dependencies,
        vec![
            PluginDependency::required("Base", v("1.0")),
            PluginDependency::optional("Extras", v("2.1")),
        ]
    );
    assert_eq!(d.arguments.len(), 2);
    assert_eq!(d.arguments[0].name, "-theme");
    assert_eq!(d.arguments[0].parameter.as_deref(), Some("name"));
    assert_eq!(d.arguments[0].description, "Select theme");
    assert_eq!(d.arguments[1].parameter, None);
    assert_eq!(d.state(), PluginState::Read);
}

#[test]
fn test_compat_version_defaults_to_version() {
    let d = parse(r#"<plugin name="A" version="2.0"/>"#).unwrap();
    assert_eq!(d.compat_version, d.version);
    assert!(d.dependencies.is_empty());
    assert!(d.vendor.is_none());
}

#[test]
fn test_missing_name_attribute() {
    let (kind, pos) = parse_err(r#"<plugin version="1.0"/>"#);
    assert_eq!(
        kind,
        ParseErrorKind::MissingAttribute {
            element: "plugin".to_string(),
            attribute: "name".to_string()
        }
    );
    assert_eq!(kind.to_string(), "'plugin' misses attribute 'name'");
    assert_eq!(pos, (1, 1));
}

#[test]
fn test_missing_dependency_version_names_the_element() {
    let text = "<plugin name=\"A\" version=\"1.0\">\n  <dependencyList>\n    <dependency name=\"B\"/>\n  </dependencyList>\n</plugin>";
    let (kind, pos) = parse_err(text);
    assert_eq!(kind.to_string(), "'dependency' misses attribute 'version'");
    assert_eq!(pos, (3, 5));
}

#[test]
fn test_malformed_version_attribute() {
    let (kind, _) = parse_err(r#"<plugin name="A" version="1.x"/>"#);
    assert_eq!(kind, ParseErrorKind::InvalidFormat("1.x".to_string()));
    assert_eq!(kind.to_string(), "'1.x' has invalid format");
}

#[test]
fn test_malformed_flags_and_dependency_type() {
    let (kind, _) = parse_err(r#"<plugin name="A" version="1.0" disabledByDefault="yes"/>"#);
    assert_eq!(kind, ParseErrorKind::InvalidFormat("yes".to_string()));

    let text = r#"<plugin name="A" version="1.0"><dependencyList><dependency name="B" version="1.0" type="sometimes"/></dependencyList></plugin>"#;
    let (kind, _) = parse_err(text);
    assert_eq!(kind, ParseErrorKind::InvalidFormat("sometimes".to_string()));
}

#[test]
fn test_unknown_element() {
    let text = "<plugin name=\"A\" version=\"1.0\">\n  <vendor>x</vendor>\n  <colour/>\n</plugin>";
    let (kind, pos) = parse_err(text);
    assert_eq!(kind.to_string(), "Invalid element 'colour'");
    assert_eq!(pos, (3, 3));
}

#[test]
fn test_unknown_element_inside_list() {
    let text = "<plugin name=\"A\" version=\"1.0\">\n  <dependencyList>\n    <argument name=\"-x\"/>\n  </dependencyList>\n</plugin>";
    let (kind, pos) = parse_err(text);
    assert_eq!(kind, ParseErrorKind::InvalidElement("argument".to_string()));
    assert_eq!(pos.0, 3);
}

#[test]
fn test_mismatched_closing_element() {
    let text = "<plugin name=\"A\" version=\"1.0\">\n  <vendor>x</vendro>\n</plugin>";
    let (kind, pos) = parse_err(text);
    assert_eq!(kind.to_string(), "Unexpected closing element 'vendro'");
    assert_eq!(pos.0, 2);
}

#[test]
fn test_lexical_errors_are_unexpected_tokens() {
    let (kind, _) = parse_err(r#"<plugin name="A" version="1.0">"#);
    assert_eq!(kind, ParseErrorKind::UnexpectedToken);

    let (kind, _) = parse_err(r#"<plugin name="A version="1.0"/>"#);
    assert_eq!(kind.to_string(), "Unexpected token");

    let (kind, _) = parse_err("");
    assert_eq!(kind, ParseErrorKind::UnexpectedToken);
}

#[test]
fn test_wrong_top_level_element() {
    let (kind, pos) = parse_err(r#"<extension name="A" version="1.0"/>"#);
    assert_eq!(
        kind.to_string(),
        "Expected element 'plugin' as top level element"
    );
    assert_eq!(pos, (1, 1));
}

#[test]
fn test_error_display_carries_file_and_position() {
    let err = parse_descriptor(
        "\n<plugin version=\"1.0\"/>",
        Path::new("plugins/a/plugin.xml"),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error parsing file plugins/a/plugin.xml: 'plugin' misses attribute 'name', at line 2, column 1"
    );
}

#[test]
fn test_round_trip_preserves_declared_fields() {
    let original = PluginDescriptor::builder("Round <&> Trip", v("3.1.4"))
        .compat_version(v("3.0"))
        .vendor("Vendor \"quoted\"")
        .license("Apache-2.0")
        .description("  Uses <tags> & 'quotes'\r\n  ")
        .category("Tools")
        .disabled_by_default(true)
        .dependency(PluginDependency::required("Base", v("1.0")))
        .dependency(PluginDependency::optional("Extra", v("2")))
        .argument("-mode", Some("value"), "Pick a mode")
        .argument("-quiet", None, "")
        .argument("-pad", Some("a\tb"), "  padded  ")
        .build();

    let text = original.to_xml();
    let parsed = parse(&text).unwrap();
    assert_eq!(parsed, original);
    assert_eq!(parsed.dependencies[1].kind, DependencyKind::Optional);
    assert_eq!(parsed.compat_version.to_string(), "3.0");
    assert_eq!(parsed.arguments[2].description, "  padded  ");
}

#[test]
fn test_element_text_is_kept_as_written() {
    let text = "<plugin name=\"A\" version=\"1.0\">\n  <vendor>  spaced </vendor>\n  <description>\n    two\n    lines\n  </description>\n</plugin>";
    let d = parse(text).unwrap();
    assert_eq!(d.vendor.as_deref(), Some("  spaced "));
    assert_eq!(d.description.as_deref(), Some("\n    two\n    lines\n  "));
}

#[tokio::test]
async fn test_read_descriptor_from_disk() {
    let dir = tempdir().unwrap();
    let plugin_dir = dir.path().join("hello");
    std::fs::create_dir(&plugin_dir).unwrap();
    let path = plugin_dir.join("plugin.xml");
    std::fs::write(&path, r#"<plugin name="Hello" version="0.3"/>"#).unwrap();

    let d = read_descriptor(&path).await.unwrap();
    assert_eq!(d.name, "Hello");
    assert_eq!(d.descriptor_path(), Some(path.as_path()));
    assert_eq!(d.location(), plugin_dir.join(libloading::library_filename("hello")));
}

#[tokio::test]
async fn test_read_missing_descriptor() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plugin.xml");
    let err = read_descriptor(&path).await.unwrap_err();
    assert!(matches!(err, DescriptorError::Io { .. }));
    assert!(err.to_string().starts_with("Cannot open file"));
    assert!(err.kind().is_none());
}
