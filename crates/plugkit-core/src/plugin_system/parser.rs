//! Reads and writes plugin descriptor documents.
//!
//! A descriptor is a small XML file with a `plugin` top-level element. See
//! [`parse_descriptor`] for the accepted elements. Every parse failure is
//! reported as a [`DescriptorError::Parse`] carrying the file path and the
//! 1-based line and column of the offending node.
// crates/plugkit-core/src/plugin_system/parser.rs
use std::fmt::Write as _;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::plugin_system::descriptor::{
    DependencyKind, PluginArgumentDescription, PluginDependency, PluginDescriptor,
};
use crate::plugin_system::error::{DescriptorError, ParseErrorKind};
use crate::plugin_system::version::PluginVersion;

const PLUGIN: &str = "plugin";
const NAME: &str = "name";
const VERSION: &str = "version";
const COMPAT_VERSION: &str = "compatVersion";
const DISABLED_BY_DEFAULT: &str = "disabledByDefault";
const EXPERIMENTAL: &str = "experimental";
const VENDOR: &str = "vendor";
const COPYRIGHT: &str = "copyright";
const LICENSE: &str = "license";
const DESCRIPTION: &str = "description";
const URL: &str = "url";
const CATEGORY: &str = "category";
const DEPENDENCY_LIST: &str = "dependencyList";
const DEPENDENCY: &str = "dependency";
const DEPENDENCY_TYPE: &str = "type";
const ARGUMENT_LIST: &str = "argumentList";
const ARGUMENT: &str = "argument";
const ARGUMENT_PARAMETER: &str = "parameter";

/// Reads and parses the descriptor file at `path`.
///
/// On success the descriptor is in state `Read` and its library location
/// points next to the descriptor file.
pub async fn read_descriptor(path: &Path) -> Result<PluginDescriptor, DescriptorError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let mut descriptor = parse_descriptor(&text, path)?;
    descriptor.set_descriptor_path(path);
    Ok(descriptor)
}

/// Parses descriptor text. `path` is only used for error reporting.
pub fn parse_descriptor(text: &str, path: &Path) -> Result<PluginDescriptor, DescriptorError> {
    let doc = Document::parse(text).map_err(|err| xml_error(&err, path))?;
    DocumentParser { doc: &doc, path }.parse()
}

struct DocumentParser<'a, 'input> {
    doc: &'a Document<'input>,
    path: &'a Path,
}

impl<'a, 'input> DocumentParser<'a, 'input> {
    fn parse(&self) -> Result<PluginDescriptor, DescriptorError> {
        let root = self.doc.root_element();
        if root.tag_name().name() != PLUGIN {
            return Err(self.error_at(
                root,
                ParseErrorKind::UnexpectedTopLevelElement {
                    expected: PLUGIN.to_string(),
                },
            ));
        }

        let name = self.required_attribute(root, NAME)?;
        let version = self.version_attribute(root, VERSION)?;
        let mut descriptor = PluginDescriptor::new(name, version);
        if root.has_attribute(COMPAT_VERSION) {
            descriptor.compat_version = self.version_attribute(root, COMPAT_VERSION)?;
        }
        descriptor.disabled_by_default = self.bool_attribute(root, DISABLED_BY_DEFAULT)?;
        descriptor.experimental = self.bool_attribute(root, EXPERIMENTAL)?;
        descriptor.set_enabled(!descriptor.is_disabled_by_default());

        for child in root.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                VENDOR => descriptor.vendor = Some(element_text(child)),
                COPYRIGHT => descriptor.copyright = Some(element_text(child)),
                LICENSE => descriptor.license = Some(element_text(child)),
                DESCRIPTION => descriptor.description = Some(element_text(child)),
                URL => descriptor.url = Some(element_text(child)),
                CATEGORY => descriptor.category = Some(element_text(child)),
                DEPENDENCY_LIST => {
                    for dep in self.list_items(child, DEPENDENCY)? {
                        descriptor.dependencies.push(self.parse_dependency(dep)?);
                    }
                }
                ARGUMENT_LIST => {
                    for arg in self.list_items(child, ARGUMENT)? {
                        descriptor.arguments.push(self.parse_argument(arg)?);
                    }
                }
                other => {
                    return Err(
                        self.error_at(child, ParseErrorKind::InvalidElement(other.to_string()))
                    );
                }
            }
        }

        Ok(descriptor)
    }

    /// Element children of a list element, all of which must be `item`
    fn list_items(
        &self,
        list: Node<'a, 'input>,
        item: &str,
    ) -> Result<Vec<Node<'a, 'input>>, DescriptorError> {
        let mut items = Vec::new();
        for child in list.children().filter(|n| n.is_element()) {
            if child.tag_name().name() != item {
                return Err(self.error_at(
                    child,
                    ParseErrorKind::InvalidElement(child.tag_name().name().to_string()),
                ));
            }
            items.push(child);
        }
        Ok(items)
    }

    fn parse_dependency(&self, elem: Node) -> Result<PluginDependency, DescriptorError> {
        let name = self.required_attribute(elem, NAME)?;
        let version = self.version_attribute(elem, VERSION)?;
        let kind = match elem.attribute(DEPENDENCY_TYPE) {
            None => DependencyKind::Required,
            Some(value) => DependencyKind::parse(value).ok_or_else(|| {
                self.error_at(elem, ParseErrorKind::InvalidFormat(value.to_string()))
            })?,
        };
        Ok(PluginDependency {
            name: name.to_string(),
            version,
            kind,
        })
    }

    fn parse_argument(&self, elem: Node) -> Result<PluginArgumentDescription, DescriptorError> {
        let name = self.required_attribute(elem, NAME)?;
        Ok(PluginArgumentDescription {
            name: name.to_string(),
            parameter: elem.attribute(ARGUMENT_PARAMETER).map(str::to_string),
            description: element_text(elem),
        })
    }

    fn required_attribute<'n, 'i>(
        &self,
        elem: Node<'n, 'i>,
        attribute: &str,
    ) -> Result<&'n str, DescriptorError> {
        elem.attribute(attribute).ok_or_else(|| {
            self.error_at(
                elem,
                ParseErrorKind::MissingAttribute {
                    element: elem.tag_name().name().to_string(),
                    attribute: attribute.to_string(),
                },
            )
        })
    }

    fn version_attribute(
        &self,
        elem: Node,
        attribute: &str,
    ) -> Result<PluginVersion, DescriptorError> {
        let value = self.required_attribute(elem, attribute)?;
        PluginVersion::parse(value)
            .map_err(|_| self.error_at(elem, ParseErrorKind::InvalidFormat(value.to_string())))
    }

    fn bool_attribute(&self, elem: Node, attribute: &str) -> Result<bool, DescriptorError> {
        match elem.attribute(attribute) {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(self.error_at(elem, ParseErrorKind::InvalidFormat(other.to_string()))),
        }
    }

    fn error_at(&self, node: Node, kind: ParseErrorKind) -> DescriptorError {
        let pos = self.doc.text_pos_at(node.range().start);
        DescriptorError::Parse {
            path: self.path.to_path_buf(),
            line: pos.row,
            column: pos.col,
            kind,
        }
    }
}

/// Text content of a leaf element exactly as written, empty when it has none
fn element_text(elem: Node) -> String {
    elem.text().unwrap_or_default().to_string()
}

fn xml_error(err: &roxmltree::Error, path: &Path) -> DescriptorError {
    let kind = match err {
        roxmltree::Error::UnexpectedCloseTag(_, actual, _) => {
            ParseErrorKind::UnexpectedClosingElement(actual.clone())
        }
        _ => ParseErrorKind::UnexpectedToken,
    };
    let pos = err.pos();
    DescriptorError::Parse {
        path: path.to_path_buf(),
        line: pos.row,
        column: pos.col,
        kind,
    }
}

/// Serializes the declared fields of `descriptor` as a descriptor document.
///
/// Runtime fields are not written. Parsing the output yields a descriptor
/// equal to the input.
pub fn write_descriptor(descriptor: &PluginDescriptor) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = write!(
        out,
        "<{PLUGIN} {NAME}=\"{}\" {VERSION}=\"{}\" {COMPAT_VERSION}=\"{}\"",
        escape_attribute(&descriptor.name),
        descriptor.version,
        descriptor.compat_version
    );
    if descriptor.disabled_by_default {
        let _ = write!(out, " {DISABLED_BY_DEFAULT}=\"true\"");
    }
    if descriptor.experimental {
        let _ = write!(out, " {EXPERIMENTAL}=\"true\"");
    }
    out.push_str(">\n");

    let text_fields = [
        (VENDOR, &descriptor.vendor),
        (COPYRIGHT, &descriptor.copyright),
        (LICENSE, &descriptor.license),
        (DESCRIPTION, &descriptor.description),
        (URL, &descriptor.url),
        (CATEGORY, &descriptor.category),
    ];
    for (tag, value) in text_fields {
        if let Some(value) = value {
            let _ = writeln!(out, "  <{tag}>{}</{tag}>", escape_text(value));
        }
    }

    if !descriptor.dependencies.is_empty() {
        let _ = writeln!(out, "  <{DEPENDENCY_LIST}>");
        for dep in &descriptor.dependencies {
            let _ = write!(
                out,
                "    <{DEPENDENCY} {NAME}=\"{}\" {VERSION}=\"{}\"",
                escape_attribute(&dep.name),
                dep.version
            );
            if dep.kind == DependencyKind::Optional {
                let _ = write!(out, " {DEPENDENCY_TYPE}=\"{}\"", dep.kind.as_str());
            }
            out.push_str("/>\n");
        }
        let _ = writeln!(out, "  </{DEPENDENCY_LIST}>");
    }

    if !descriptor.arguments.is_empty() {
        let _ = writeln!(out, "  <{ARGUMENT_LIST}>");
        for arg in &descriptor.arguments {
            let _ = write!(out, "    <{ARGUMENT} {NAME}=\"{}\"", escape_attribute(&arg.name));
            if let Some(parameter) = &arg.parameter {
                let _ = write!(out, " {ARGUMENT_PARAMETER}=\"{}\"", escape_attribute(parameter));
            }
            let _ = writeln!(out, ">{}</{ARGUMENT}>", escape_text(&arg.description));
        }
        let _ = writeln!(out, "  </{ARGUMENT_LIST}>");
    }

    let _ = writeln!(out, "</{PLUGIN}>");
    out
}

/// Escapes element text. Carriage returns become character references so
/// that line-end normalization does not eat them.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\r' => escaped.push_str("&#13;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escapes an attribute value. Attribute values are whitespace-normalized
/// on read, so every whitespace control character is written as a reference.
fn escape_attribute(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' => escaped.push_str("&#9;"),
            '\n' => escaped.push_str("&#10;"),
            _ => escaped.push_str(&escape_text(c.encode_utf8(&mut [0; 4]))),
        }
    }
    escaped
}
